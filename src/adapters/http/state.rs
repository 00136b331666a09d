use std::sync::Arc;

use crate::application::services::StreamService;

/// Shared state for the axum handlers.
#[derive(Clone)]
pub struct HttpState {
    /// Detection pipeline, capture session and ledger.
    pub service: Arc<StreamService>,
    /// Quality of JPEGs returned by `/detect`.
    pub jpeg_quality: u8,
}
