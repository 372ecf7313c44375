//! HTTP API for the dialogue session
//!
//! The browser hosts the speech adapter: it receives adapter commands over
//! SSE and posts recognizer and synthesizer events back.

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::runtime::SessionHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub session: SessionHandle,
}

impl AppState {
    pub fn new(session: SessionHandle) -> Self {
        Self { session }
    }
}
