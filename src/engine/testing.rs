//! Mock adapters for engine tests
//!
//! These mocks enable driving full conversations without real I/O.

use crate::notify::Notifier;
use crate::orders::{OrderDbError, OrderSnapshot, OrderStatus, OrderStore};
use crate::resolver::{IntentOutcome, IntentResolver, ResolverError};
use crate::session::ConvState;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

// ============================================================================
// Mock Intent Resolver
// ============================================================================

/// Resolver returning queued outcomes, recording every request
pub struct MockResolver {
    outcomes: Mutex<VecDeque<Result<IntentOutcome, ResolverError>>>,
    pub requests: Mutex<Vec<(String, ConvState)>>,
}

#[allow(dead_code)]
impl MockResolver {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn queue(&self, outcome: IntentOutcome) {
        self.outcomes.lock().unwrap().push_back(Ok(outcome));
    }

    pub fn queue_error(&self, error: ResolverError) {
        self.outcomes.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<(String, ConvState)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl IntentResolver for MockResolver {
    async fn resolve(
        &self,
        text: &str,
        state: ConvState,
        _order: Option<&OrderSnapshot>,
    ) -> Result<IntentOutcome, ResolverError> {
        self.requests
            .lock()
            .unwrap()
            .push((text.to_string(), state));
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ResolverError::network("No mock outcome queued")))
    }
}

// ============================================================================
// Mock Order Store
// ============================================================================

/// In-memory order store with switchable failure injection
pub struct MockOrderStore {
    orders: Mutex<HashMap<String, OrderSnapshot>>,
    pub fail_reschedule: AtomicBool,
    pub reschedule_calls: Mutex<Vec<(String, DateTime<Utc>)>>,
}

#[allow(dead_code)]
impl MockOrderStore {
    pub fn new() -> Self {
        Self {
            orders: Mutex::new(HashMap::new()),
            fail_reschedule: AtomicBool::new(false),
            reschedule_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_order(self, order: OrderSnapshot) -> Self {
        self.orders
            .lock()
            .unwrap()
            .insert(order.tracking_id.clone(), order);
        self
    }

    pub fn snapshot(&self, tracking_id: &str) -> Option<OrderSnapshot> {
        self.orders.lock().unwrap().get(tracking_id).cloned()
    }
}

#[async_trait]
impl OrderStore for MockOrderStore {
    async fn get(&self, tracking_id: &str) -> Result<Option<OrderSnapshot>, OrderDbError> {
        Ok(self.orders.lock().unwrap().get(tracking_id).cloned())
    }

    async fn reschedule(
        &self,
        tracking_id: &str,
        new_date: DateTime<Utc>,
    ) -> Result<bool, OrderDbError> {
        // A real store write suspends the caller; give concurrent
        // messages the same interleaving window.
        tokio::task::yield_now().await;
        self.reschedule_calls
            .lock()
            .unwrap()
            .push((tracking_id.to_string(), new_date));

        if self.fail_reschedule.load(Ordering::SeqCst) {
            return Err(OrderDbError::OrderNotFound(tracking_id.to_string()));
        }

        let mut orders = self.orders.lock().unwrap();
        match orders.get_mut(tracking_id) {
            Some(order) => {
                order.scheduled_delivery = Some(new_date);
                order.status = OrderStatus::Rescheduled;
                order.rescheduled = true;
                order.last_update = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn reset_to_seed(&self) -> Result<(), OrderDbError> {
        Ok(())
    }
}

// ============================================================================
// Recording Notifier
// ============================================================================

/// Notifier that records sends instead of delivering them
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
    accept: bool,
}

#[allow(dead_code)]
impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            accept: true,
        }
    }

    pub fn rejecting() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            accept: false,
        }
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Pull the 6-digit code out of the last OTP notification
    pub fn last_otp_code(&self) -> Option<String> {
        let sent = self.sent.lock().unwrap();
        let (_, body) = sent.last()?;
        body.split(|c: char| !c.is_ascii_digit())
            .find(|chunk| chunk.len() == 6)
            .map(ToString::to_string)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, phone: &str, message: &str) -> bool {
        self.sent
            .lock()
            .unwrap()
            .push((phone.to_string(), message.to_string()));
        self.accept
    }
}

/// A reschedulable in-transit order for tests
pub fn in_transit_order(tracking_id: &str) -> OrderSnapshot {
    OrderSnapshot {
        tracking_id: tracking_id.to_string(),
        status: OrderStatus::InTransit,
        last_update: Utc::now() - Duration::hours(4),
        estimated_delivery: Utc::now() + Duration::days(2),
        scheduled_delivery: None,
        delay_reason: None,
        customer_name: Some("Test Customer".to_string()),
        customer_phone: Some("+15550001111".to_string()),
        rescheduled: false,
    }
}
