//! Intent resolution: free text -> structured conversational intent
//!
//! The engine never sees raw model output; it consumes the closed
//! [`IntentAction`] set and treats any resolver failure as a signal to
//! fall back, not crash.

mod anthropic;
mod error;

pub use anthropic::AnthropicResolver;
pub use error::ResolverError;
#[cfg(test)]
pub use error::ResolverErrorKind;

use crate::orders::OrderSnapshot;
use crate::session::ConvState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Closed set of actions an utterance can resolve to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntentAction {
    OrderStatus,
    OrderDetails,
    OrderReschedule,
    Greeting,
    Farewell,
    None,
}

/// Structured outcome of resolving one utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentOutcome {
    pub action: IntentAction,
    /// Tracking id the model spotted in the text, if any
    #[serde(default)]
    pub tracking_id: Option<String>,
}

impl IntentOutcome {
    pub fn new(action: IntentAction) -> Self {
        Self {
            action,
            tracking_id: None,
        }
    }
}

/// Seam to the external language model
#[async_trait]
pub trait IntentResolver: Send + Sync {
    /// Resolve one utterance given the session's state and order context
    async fn resolve(
        &self,
        text: &str,
        state: ConvState,
        order: Option<&OrderSnapshot>,
    ) -> Result<IntentOutcome, ResolverError>;
}

#[async_trait]
impl<T: IntentResolver + ?Sized> IntentResolver for Arc<T> {
    async fn resolve(
        &self,
        text: &str,
        state: ConvState,
        order: Option<&OrderSnapshot>,
    ) -> Result<IntentOutcome, ResolverError> {
        (**self).resolve(text, state, order).await
    }
}
