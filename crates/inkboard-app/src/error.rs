//! Application errors.

use inkboard_core::SessionError;
use inkboard_render::RendererError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// A required DOM element is missing. Setup cannot continue.
    #[error("Missing element: #{0}")]
    MissingElement(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    /// A browser API call failed.
    #[error("Browser error: {0}")]
    Browser(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Render(#[from] RendererError),
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Config(e.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
