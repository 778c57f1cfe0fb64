use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chart_render::RenderError;
use quote_client::QuoteError;
use thiserror::Error;

/// The only thing a caller ever sees when a chart cannot be produced.
pub const CHART_ERROR_MESSAGE: &str = "Something went wrong, can't render chart";

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("quote source: {0}")]
    Quote(#[from] QuoteError),
    #[error("render: {0}")]
    Render(#[from] RenderError),
}

impl ChartError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ChartError::Quote(e) if e.is_timeout())
    }
}

impl IntoResponse for ChartError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, CHART_ERROR_MESSAGE).into_response()
    }
}
