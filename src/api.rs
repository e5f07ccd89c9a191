//! HTTP API for the switchboard
//!
//! Inbound messages from the transport gateway, analytics counts, version.

mod handlers;
mod types;

pub use handlers::create_router;

use crate::runtime::{Analytics, RuntimeHandle};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: RuntimeHandle,
    pub analytics: Arc<dyn Analytics>,
}

impl AppState {
    pub fn new(runtime: RuntimeHandle, analytics: Arc<dyn Analytics>) -> Self {
        Self { runtime, analytics }
    }
}
