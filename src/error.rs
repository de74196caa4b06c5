use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type DashboardResult<T> = Result<T, DashboardError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DashboardError {
    #[error("City not found: {0}")]
    CityNotFound(String),

    #[error("Unknown policy variable: {0}")]
    UnknownVariable(String),

    #[error("No cities available in the dataset")]
    NoCities,
}

impl DashboardError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DashboardError::CityNotFound(_) => StatusCode::NOT_FOUND,
            DashboardError::UnknownVariable(_) => StatusCode::BAD_REQUEST,
            DashboardError::NoCities => StatusCode::NOT_FOUND,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
        });
        (status, body).into_response()
    }
}
