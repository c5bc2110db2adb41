use std::sync::Arc;

use crate::services::{store::RatingStore, SessionManager};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub store: Arc<dyn RatingStore>,
}

impl AppState {
    /// The session engine's store also serves rating listings
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        let store = sessions.engine().store().clone();
        Self { sessions, store }
    }
}
