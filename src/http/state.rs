use crate::config::Config;
use std::sync::Arc;

/// Shared application state for HTTP handlers.
///
/// Deliberately small: relay sessions are self-contained and own their
/// sockets, so no global session registry exists.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}
