//! HTTP gateway for parceldesk
//!
//! Thin layer: translates wire requests into conversation-engine calls.

mod handlers;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::engine::Engine;
use crate::notify::Notifier;
use crate::orders::OrderStore;
use crate::resolver::IntentResolver;
use crate::session::SessionStore;
use std::sync::Arc;

/// Engine wired with boxed adapters, as handlers see it
pub type DynEngine = Engine<Arc<dyn IntentResolver>, Arc<dyn OrderStore>, Arc<dyn Notifier>>;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DynEngine>,
    pub orders: Arc<dyn OrderStore>,
}

impl AppState {
    pub fn new(
        sessions: Arc<SessionStore>,
        resolver: Arc<dyn IntentResolver>,
        orders: Arc<dyn OrderStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            engine: Arc::new(Engine::new(
                sessions,
                resolver,
                Arc::clone(&orders),
                notifier,
            )),
            orders,
        }
    }
}
