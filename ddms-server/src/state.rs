use std::sync::Arc;

use ddms_config::Config;
use ddms_core::StoreHandle;

/// Shared request state: a broker handle and the effective configuration.
#[derive(Clone)]
pub struct AppState {
    pub store: StoreHandle,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: StoreHandle, config: Arc<Config>) -> Self {
        Self { store, config }
    }
}
