//! Shared application state injected into every handler.

use relay_core::{Orchestrator, SessionValidator};
use std::sync::Arc;

pub struct AppState {
    pub orchestrator: Orchestrator,
    pub sessions: Arc<dyn SessionValidator>,
}
