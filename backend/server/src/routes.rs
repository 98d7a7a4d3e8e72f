use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State as AxumState, rejection::QueryRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use tracing::info;

use crate::{error::AppError, lookup::ExpenditureResult, state::State};

/// Raw `/gastos` parameters. Keys may repeat, so every value is kept.
#[derive(Debug, Default, PartialEq)]
pub struct GastosQuery {
    pub cidade: Vec<String>,
    pub ano: Vec<String>,
}

impl GastosQuery {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut query = Self::default();

        for (key, value) in pairs {
            match key.as_str() {
                "cidade" => query.cidade.push(value),
                "ano" => query.ano.push(value),
                _ => {}
            }
        }

        query
    }

    /// Both parameters, or `MissingParams` when either is absent or empty.
    /// A repeated parameter never equals a row's text, so it resolves to
    /// `NotFound` without a lookup.
    pub fn required(&self) -> Result<(&str, &str), AppError> {
        let cidade = single(&self.cidade)?;
        let ano = single(&self.ano)?;

        match (cidade, ano) {
            (Some(cidade), Some(ano)) => Ok((cidade, ano)),
            _ => Err(AppError::NotFound),
        }
    }
}

fn single(values: &[String]) -> Result<Option<&str>, AppError> {
    match values {
        [] => Err(AppError::MissingParams),
        [value] if value.is_empty() => Err(AppError::MissingParams),
        [value] => Ok(Some(value.as_str())),
        _ => Ok(None),
    }
}

pub async fn gastos_handler(
    AxumState(state): AxumState<Arc<State>>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<ExpenditureResult>, AppError> {
    let Query(pairs) = query.map_err(|e| AppError::InvalidQuery(e.body_text()))?;
    let query = GastosQuery::from_pairs(pairs);

    let (cidade, ano) = query.required()?;

    let result = state.lookup.find(cidade, ano).await?;

    Ok(Json(result))
}

pub async fn reload_handler(
    AxumState(state): AxumState<Arc<State>>,
) -> Result<impl IntoResponse, AppError> {
    let registros = state.lookup.reload().await?;
    info!("Reload requested, {registros} records loaded");

    Ok((StatusCode::OK, Json(json!({ "registros": registros }))))
}

pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
