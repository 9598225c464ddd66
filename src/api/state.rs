//! Application state for the API server

use crate::{Config, Supervisor};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (cheap Arc clone).
#[derive(Clone)]
pub struct AppState {
    /// Supervisor owning all jobs
    pub supervisor: Arc<Supervisor>,

    /// Configuration (read-only)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(supervisor: Arc<Supervisor>, config: Arc<Config>) -> Self {
        Self { supervisor, config }
    }
}
