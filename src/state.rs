//! Shared application state for all routes. Registry and store are injected once at startup.

use crate::config::Registry;
use crate::hooks::Hooks;
use crate::service::JsonApiService;
use crate::store::DataStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DataStore>,
    pub registry: Arc<Registry>,
    pub hooks: Hooks,
}

impl AppState {
    pub fn new(store: Arc<dyn DataStore>, registry: Arc<Registry>) -> Self {
        AppState {
            store,
            registry,
            hooks: Hooks::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn service(&self) -> JsonApiService {
        JsonApiService::new(Arc::clone(&self.store), Arc::clone(&self.registry))
    }
}
