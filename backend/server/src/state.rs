use std::sync::Arc;

use anyhow::Context;

use super::{config::Config, lookup::LookupService};

pub struct State {
    pub config: Config,
    pub lookup: LookupService,
}

impl State {
    pub async fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let lookup = LookupService::new(config.data_path.clone(), config.load_mode)
            .await
            .with_context(|| {
                format!(
                    "Failed to load initial dataset from {}",
                    config.data_path.display()
                )
            })?;

        Ok(Arc::new(Self { config, lookup }))
    }
}
