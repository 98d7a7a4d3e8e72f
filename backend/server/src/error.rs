use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::{lookup::LookupError, store::StoreError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("cidade e ano são obrigatórios")]
    MissingParams,

    #[error("Parâmetros de consulta inválidos")]
    InvalidQuery(String),

    #[error("Dados não encontrados")]
    NotFound,

    #[error("Erro ao ler dados de gastos")]
    Store(#[from] StoreError),

    #[error("Dados de gastos inválidos")]
    Lookup(#[from] LookupError),

    #[error("Erro interno do servidor")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingParams | AppError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Store(_) | AppError::Lookup(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // client-facing message stays generic, the cause only goes to the log
        match &self {
            AppError::Store(e) => error!("Data source failure: {e}"),
            AppError::Lookup(e) => error!("Data integrity failure: {e}"),
            AppError::Internal(e) => error!("Internal failure: {e}"),
            AppError::InvalidQuery(e) => warn!("Rejected query string: {e}"),
            AppError::MissingParams | AppError::NotFound => {}
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
