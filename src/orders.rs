//! Order store: snapshots of tracked orders and the persistence seam
//!
//! The conversation engine only ever sees [`OrderSnapshot`] copies; the
//! store owns the live records.

mod store;

pub use store::{OrderDb, OrderDbError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Delivery status of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Processing,
    Shipped,
    InTransit,
    OutForDelivery,
    Delivered,
    Delayed,
    Rescheduled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::InTransit => "in_transit",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Delayed => "delayed",
            OrderStatus::Rescheduled => "rescheduled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(OrderStatus::Processing),
            "shipped" => Some(OrderStatus::Shipped),
            "in_transit" => Some(OrderStatus::InTransit),
            "out_for_delivery" => Some(OrderStatus::OutForDelivery),
            "delivered" => Some(OrderStatus::Delivered),
            "delayed" => Some(OrderStatus::Delayed),
            "rescheduled" => Some(OrderStatus::Rescheduled),
            _ => None,
        }
    }

    /// Human-readable form used in replies
    pub fn display(self) -> &'static str {
        match self {
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::InTransit => "In Transit",
            OrderStatus::OutForDelivery => "Out for Delivery",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Delayed => "Delayed",
            OrderStatus::Rescheduled => "Rescheduled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display())
    }
}

/// Read-mostly projection of a stored order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub tracking_id: String,
    pub status: OrderStatus,
    pub last_update: DateTime<Utc>,
    pub estimated_delivery: DateTime<Utc>,
    pub scheduled_delivery: Option<DateTime<Utc>>,
    pub delay_reason: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub rescheduled: bool,
}

impl OrderSnapshot {
    /// An order may be rescheduled once, and only before the final leg.
    pub fn is_reschedulable(&self) -> bool {
        !self.rescheduled
            && !matches!(
                self.status,
                OrderStatus::Delivered | OrderStatus::OutForDelivery
            )
    }
}

/// Persistence seam for order records
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Fetch a fresh snapshot by tracking id
    async fn get(&self, tracking_id: &str) -> Result<Option<OrderSnapshot>, OrderDbError>;

    /// Apply a reschedule: new scheduled delivery, status `Rescheduled`,
    /// `rescheduled` flag set, `last_update` bumped.
    async fn reschedule(
        &self,
        tracking_id: &str,
        new_date: DateTime<Utc>,
    ) -> Result<bool, OrderDbError>;

    /// Restore the order table to its seed rows (admin surface)
    async fn reset_to_seed(&self) -> Result<(), OrderDbError>;
}

#[async_trait]
impl<T: OrderStore + ?Sized> OrderStore for Arc<T> {
    async fn get(&self, tracking_id: &str) -> Result<Option<OrderSnapshot>, OrderDbError> {
        (**self).get(tracking_id).await
    }

    async fn reschedule(
        &self,
        tracking_id: &str,
        new_date: DateTime<Utc>,
    ) -> Result<bool, OrderDbError> {
        (**self).reschedule(tracking_id, new_date).await
    }

    async fn reset_to_seed(&self) -> Result<(), OrderDbError> {
        (**self).reset_to_seed().await
    }
}
