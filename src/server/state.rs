use std::sync::Arc;

use crate::embedding::Embedder;
use crate::server::errors::AppError;

/// Shared by every handler. The model is loaded once at startup and is `None`
/// when that failed.
#[derive(Clone)]
pub struct AppState {
    text_embedding: Option<Arc<dyn Embedder>>,
}

impl AppState {
    pub fn new(text_embedding: Option<Arc<dyn Embedder>>) -> Self {
        Self { text_embedding }
    }

    pub fn model(&self) -> Result<Arc<dyn Embedder>, AppError> {
        self.text_embedding
            .clone()
            .ok_or(AppError::ModelUnavailable)
    }

    pub fn model_loaded(&self) -> bool {
        self.text_embedding.is_some()
    }
}
