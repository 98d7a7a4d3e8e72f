//! # Lookup Service
//!
//! Resolves a single (cidade, ano) query against the Record Store.
//!
//! ## Matching
//! - Exact string equality on both fields, no case-folding or trimming
//! - First occurrence in file order wins, later duplicates are ignored
//!
//! ## Load Modes
//! - `PerRequest`: every lookup re-reads and re-parses the whole file on the
//!   blocking pool, then scans linearly.
//! - `Indexed`: the file is loaded once into a (cidade, ano) map and only
//!   refreshed through [`LookupService::reload`]. A failed reload keeps the
//!   previous index.
//!
//! Amounts are coerced at lookup time in both modes, so a bad amount only
//! affects the rows that are actually requested.
use std::{
    collections::{HashMap, hash_map::Entry},
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Serialize, Serializer};
use thiserror::Error;
use tokio::{
    sync::{Mutex, RwLock},
    task::spawn_blocking,
};
use tracing::{debug, info};

use crate::{
    config::LoadMode,
    error::AppError,
    store::{
        EDUCATION_COLUMN, ExpenditureRecord, HEALTH_COLUMN, TRANSPORT_COLUMN, load_records,
    },
};

#[derive(Error, Debug, PartialEq)]
pub enum LookupError {
    #[error("Non-numeric {column} value `{value}` for {cidade}/{ano}")]
    DataIntegrity {
        cidade: String,
        ano: String,
        column: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExpenditureResult {
    #[serde(rename = "Saúde", serialize_with = "serialize_amount")]
    pub saude: f64,

    #[serde(rename = "Educação", serialize_with = "serialize_amount")]
    pub educacao: f64,

    #[serde(rename = "Transporte", serialize_with = "serialize_amount")]
    pub transporte: f64,
}

impl TryFrom<&ExpenditureRecord> for ExpenditureResult {
    type Error = LookupError;

    fn try_from(record: &ExpenditureRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            saude: parse_amount(record, HEALTH_COLUMN, &record.saude)?,
            educacao: parse_amount(record, EDUCATION_COLUMN, &record.educacao)?,
            transporte: parse_amount(record, TRANSPORT_COLUMN, &record.transporte)?,
        })
    }
}

/// Plain decimal text only, surrounding whitespace allowed. JS `Number`
/// forms that `f64` parsing does not take (`""` as 0, `0x10`, `0b1`) are
/// data-integrity errors rather than coerced.
fn parse_amount(
    record: &ExpenditureRecord,
    column: &'static str,
    value: &str,
) -> Result<f64, LookupError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|amount| amount.is_finite())
        .ok_or_else(|| LookupError::DataIntegrity {
            cidade: record.cidade.clone(),
            ano: record.ano.clone(),
            column,
            value: value.to_string(),
        })
}

// whole amounts go out as JSON integers (5000000, not 5000000.0)
fn serialize_amount<S: Serializer>(amount: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if amount.fract() == 0.0 && amount.abs() < i64::MAX as f64 {
        serializer.serialize_i64(*amount as i64)
    } else {
        serializer.serialize_f64(*amount)
    }
}

/// Linear scan, first match wins.
pub fn find_expenditure(
    records: &[ExpenditureRecord],
    cidade: &str,
    ano: &str,
) -> Result<Option<ExpenditureResult>, LookupError> {
    records
        .iter()
        .find(|record| record.cidade == cidade && record.ano == ano)
        .map(ExpenditureResult::try_from)
        .transpose()
}

/// Records keyed by (cidade, ano), keeping the first row seen for each key.
#[derive(Debug, Default)]
pub struct ExpenditureIndex {
    records: HashMap<(String, String), ExpenditureRecord>,
    total_rows: usize,
}

impl ExpenditureIndex {
    pub fn build(records: Vec<ExpenditureRecord>) -> Self {
        let total_rows = records.len();
        let mut map = HashMap::with_capacity(total_rows);

        for record in records {
            if let Entry::Vacant(slot) = map.entry((record.cidade.clone(), record.ano.clone())) {
                slot.insert(record);
            }
        }

        Self {
            records: map,
            total_rows,
        }
    }

    pub fn get(&self, cidade: &str, ano: &str) -> Result<Option<ExpenditureResult>, LookupError> {
        self.records
            .get(&(cidade.to_string(), ano.to_string()))
            .map(ExpenditureResult::try_from)
            .transpose()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows read from the file, duplicates included.
    pub fn total_rows(&self) -> usize {
        self.total_rows
    }
}

enum Source {
    PerRequest,
    Indexed(RwLock<Arc<ExpenditureIndex>>),
}

pub struct LookupService {
    data_path: PathBuf,
    source: Source,
    // held from read to swap so an older read never replaces a newer index
    reload_lock: Mutex<()>,
}

impl LookupService {
    /// In indexed mode this performs the initial load and fails if the
    /// dataset cannot be read.
    pub async fn new(data_path: PathBuf, mode: LoadMode) -> Result<Self, AppError> {
        let source = match mode {
            LoadMode::PerRequest => Source::PerRequest,
            LoadMode::Indexed => {
                let index = build_index(data_path.clone()).await?;
                info!(
                    "Indexed {} keys from {} rows in {}",
                    index.len(),
                    index.total_rows(),
                    data_path.display()
                );
                Source::Indexed(RwLock::new(Arc::new(index)))
            }
        };

        Ok(Self {
            data_path,
            source,
            reload_lock: Mutex::new(()),
        })
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn mode(&self) -> LoadMode {
        match self.source {
            Source::PerRequest => LoadMode::PerRequest,
            Source::Indexed(_) => LoadMode::Indexed,
        }
    }

    pub async fn find(&self, cidade: &str, ano: &str) -> Result<ExpenditureResult, AppError> {
        let found = match &self.source {
            Source::PerRequest => {
                let records = read_records(self.data_path.clone()).await?;
                find_expenditure(&records, cidade, ano)?
            }
            Source::Indexed(index) => {
                let index = index.read().await.clone();
                index.get(cidade, ano)?
            }
        };

        found.ok_or(AppError::NotFound)
    }

    /// Re-reads the dataset and returns the number of rows loaded. In
    /// per-request mode this only checks that the file still loads.
    pub async fn reload(&self) -> Result<usize, AppError> {
        match &self.source {
            Source::PerRequest => Ok(read_records(self.data_path.clone()).await?.len()),
            Source::Indexed(current) => {
                let _reloading = self.reload_lock.lock().await;
                let index = build_index(self.data_path.clone()).await?;
                let rows = index.total_rows();

                info!(
                    "Reloaded {} keys from {} rows in {}",
                    index.len(),
                    rows,
                    self.data_path.display()
                );
                *current.write().await = Arc::new(index);

                Ok(rows)
            }
        }
    }
}

async fn read_records(path: PathBuf) -> Result<Vec<ExpenditureRecord>, AppError> {
    let records = spawn_blocking(move || load_records(&path))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    debug!("Scanning {} records", records.len());

    Ok(records)
}

async fn build_index(path: PathBuf) -> Result<ExpenditureIndex, AppError> {
    read_records(path).await.map(ExpenditureIndex::build)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(cidade: &str, ano: &str, amounts: [&str; 3]) -> ExpenditureRecord {
        ExpenditureRecord {
            cidade: cidade.into(),
            ano: ano.into(),
            saude: amounts[0].into(),
            educacao: amounts[1].into(),
            transporte: amounts[2].into(),
        }
    }

    fn sample() -> Vec<ExpenditureRecord> {
        vec![
            record("São Paulo", "2024", ["5000000", "3000000", "2000000"]),
            record("Campinas", "2024", ["1200000", "800000", "450000"]),
            record("São Paulo", "2024", ["1", "2", "3"]),
            record("Recife", "2023", ["abc", "10", "20"]),
        ]
    }

    #[test]
    fn test_find_match() {
        let result = find_expenditure(&sample(), "Campinas", "2024").unwrap();

        assert_eq!(
            result,
            Some(ExpenditureResult {
                saude: 1_200_000.0,
                educacao: 800_000.0,
                transporte: 450_000.0,
            })
        );
    }

    #[test]
    fn test_first_duplicate_wins() {
        let result = find_expenditure(&sample(), "São Paulo", "2024")
            .unwrap()
            .unwrap();

        assert_eq!(result.saude, 5_000_000.0);
    }

    #[test]
    fn test_exact_match_only() {
        let records = sample();

        assert_eq!(find_expenditure(&records, "Atlantis", "2024"), Ok(None));
        assert_eq!(find_expenditure(&records, "são paulo", "2024"), Ok(None));
        assert_eq!(find_expenditure(&records, "São Paulo ", "2024"), Ok(None));
        assert_eq!(find_expenditure(&records, "São Paulo", "2023"), Ok(None));
    }

    #[test]
    fn test_non_numeric_amount() {
        let err = find_expenditure(&sample(), "Recife", "2023").unwrap_err();

        assert_eq!(
            err,
            LookupError::DataIntegrity {
                cidade: "Recife".into(),
                ano: "2023".into(),
                column: HEALTH_COLUMN,
                value: "abc".into(),
            }
        );
    }

    #[test]
    fn test_amount_coercion() {
        let parsed = ExpenditureResult::try_from(&record("X", "1", [" 42 ", "1.5", "1e3"])).unwrap();
        assert_eq!(parsed.saude, 42.0);
        assert_eq!(parsed.educacao, 1.5);
        assert_eq!(parsed.transporte, 1000.0);

        for bad in ["", "NaN", "inf", "1.000,00", "0x10"] {
            assert!(ExpenditureResult::try_from(&record("X", "1", ["1", bad, "1"])).is_err());
        }
    }

    #[test]
    fn test_serialized_keys_and_integers() {
        let result = ExpenditureResult {
            saude: 5_000_000.0,
            educacao: 3_000_000.0,
            transporte: 2.5,
        };

        assert_eq!(
            serde_json::to_string(&result).unwrap(),
            r#"{"Saúde":5000000,"Educação":3000000,"Transporte":2.5}"#
        );
    }

    #[tokio::test]
    async fn test_concurrent_reloads_keep_latest() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all("cidade,ano,Saúde,Educação,Transporte\nNatal,2024,1,2,3\n".as_bytes())
            .unwrap();

        let service = Arc::new(
            LookupService::new(file.path().to_path_buf(), LoadMode::Indexed)
                .await
                .unwrap(),
        );

        std::fs::write(
            file.path(),
            "cidade,ano,Saúde,Educação,Transporte\nNatal,2024,10,20,30\nRecife,2024,4,5,6\n",
        )
        .unwrap();

        let reloads: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.reload().await })
            })
            .collect();
        for reload in reloads {
            assert_eq!(reload.await.unwrap().unwrap(), 2);
        }

        let natal = service.find("Natal", "2024").await.unwrap();
        assert_eq!(natal.saude, 10.0);
        assert!(service.find("Recife", "2024").await.is_ok());
    }

    #[tokio::test]
    async fn test_reload_waits_for_running_reload() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "cidade,ano,Saúde,Educação,Transporte\n").unwrap();

        let service = Arc::new(
            LookupService::new(file.path().to_path_buf(), LoadMode::Indexed)
                .await
                .unwrap(),
        );

        let held = service.reload_lock.lock().await;
        let pending = tokio::spawn({
            let service = service.clone();
            async move { service.reload().await }
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!pending.is_finished());

        drop(held);
        assert_eq!(pending.await.unwrap().unwrap(), 0);
    }

    #[test]
    fn test_index_agrees_with_scan() {
        let records = sample();
        let index = ExpenditureIndex::build(records.clone());

        assert_eq!(index.len(), 3);
        assert_eq!(index.total_rows(), 4);

        for (cidade, ano) in [
            ("São Paulo", "2024"),
            ("Campinas", "2024"),
            ("Recife", "2023"),
            ("Atlantis", "2024"),
        ] {
            assert_eq!(
                index.get(cidade, ano),
                find_expenditure(&records, cidade, ano)
            );
        }
    }
}
