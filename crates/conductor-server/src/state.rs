//! Application state shared across Axum handlers

use std::sync::Arc;

use conductor_core::{ModelMap, Scheduler};

/// Shared application state handed to every handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Owns providers, the admission queue, and the worker task.
    pub scheduler: Arc<Scheduler>,
    /// Unified model namespace, shared read-only with every registered adapter.
    pub model_map: Arc<ModelMap>,
}
