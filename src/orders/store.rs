//! SQLite-backed order store

use super::{OrderSnapshot, OrderStatus, OrderStore};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrderDbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Order not found: {0}")]
    OrderNotFound(String),
}

/// SQL schema for initialization
const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS orders (
    tracking_id TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    last_update TEXT NOT NULL,
    estimated_delivery TEXT NOT NULL,
    scheduled_delivery TEXT,
    delay_reason TEXT,
    customer_name TEXT,
    customer_phone TEXT,
    rescheduled BOOLEAN NOT NULL DEFAULT 0
);
";

/// Thread-safe order database handle
#[derive(Clone)]
pub struct OrderDb {
    conn: Arc<Mutex<Connection>>,
}

impl OrderDb {
    /// Open or create the database at the given path, seeding if empty
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, OrderDbError> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, OrderDbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<(), OrderDbError> {
        let conn = self.lock();
        conn.execute_batch(SCHEMA)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))?;
        drop(conn);
        if count == 0 {
            self.seed()?;
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // Lock poisoning only happens on panic while holding the guard;
        // queries here are straight-line rusqlite calls.
        self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn seed(&self) -> Result<(), OrderDbError> {
        let conn = self.lock();
        let now = Utc::now();
        for order in seed_orders(now) {
            conn.execute(
                "INSERT INTO orders (tracking_id, status, last_update, estimated_delivery,
                                     scheduled_delivery, delay_reason, customer_name,
                                     customer_phone, rescheduled)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    order.tracking_id,
                    order.status.as_str(),
                    order.last_update.to_rfc3339(),
                    order.estimated_delivery.to_rfc3339(),
                    order.scheduled_delivery.map(|d| d.to_rfc3339()),
                    order.delay_reason,
                    order.customer_name,
                    order.customer_phone,
                    order.rescheduled,
                ],
            )?;
        }
        Ok(())
    }

    fn get_sync(&self, tracking_id: &str) -> Result<Option<OrderSnapshot>, OrderDbError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT tracking_id, status, last_update, estimated_delivery, scheduled_delivery,
                    delay_reason, customer_name, customer_phone, rescheduled
             FROM orders WHERE tracking_id = ?1",
        )?;

        let result = stmt.query_row(params![tracking_id], |row| {
            let status_raw: String = row.get(1)?;
            let status = OrderStatus::parse(&status_raw).ok_or_else(|| {
                corrupt_column(1, format!("unknown order status {status_raw:?}"))
            })?;
            Ok(OrderSnapshot {
                tracking_id: row.get(0)?,
                status,
                last_update: parse_datetime(2, &row.get::<_, String>(2)?)?,
                estimated_delivery: parse_datetime(3, &row.get::<_, String>(3)?)?,
                scheduled_delivery: row
                    .get::<_, Option<String>>(4)?
                    .map(|s| parse_datetime(4, &s))
                    .transpose()?,
                delay_reason: row.get(5)?,
                customer_name: row.get(6)?,
                customer_phone: row.get(7)?,
                rescheduled: row.get(8)?,
            })
        });

        match result {
            Ok(order) => Ok(Some(order)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(OrderDbError::Sqlite(e)),
        }
    }

    fn reschedule_sync(
        &self,
        tracking_id: &str,
        new_date: DateTime<Utc>,
    ) -> Result<bool, OrderDbError> {
        let conn = self.lock();
        let now = Utc::now();
        let updated = conn.execute(
            "UPDATE orders
             SET scheduled_delivery = ?2, status = ?3, rescheduled = 1, last_update = ?4
             WHERE tracking_id = ?1",
            params![
                tracking_id,
                new_date.to_rfc3339(),
                OrderStatus::Rescheduled.as_str(),
                now.to_rfc3339(),
            ],
        )?;
        Ok(updated > 0)
    }

    fn reset_sync(&self) -> Result<(), OrderDbError> {
        {
            let conn = self.lock();
            conn.execute("DELETE FROM orders", [])?;
        }
        self.seed()
    }
}

#[async_trait]
impl OrderStore for OrderDb {
    async fn get(&self, tracking_id: &str) -> Result<Option<OrderSnapshot>, OrderDbError> {
        self.get_sync(tracking_id)
    }

    async fn reschedule(
        &self,
        tracking_id: &str,
        new_date: DateTime<Utc>,
    ) -> Result<bool, OrderDbError> {
        self.reschedule_sync(tracking_id, new_date)
    }

    async fn reset_to_seed(&self) -> Result<(), OrderDbError> {
        self.reset_sync()
    }
}

// Corrupt stored values must error out of the row mapper rather than be
// coerced to a default; a garbled status could otherwise change what the
// engine believes about an order.
fn corrupt_column(index: usize, detail: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, detail.into())
}

fn parse_datetime(index: usize, s: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Demo dataset loaded on first open and on admin reset
fn seed_orders(now: DateTime<Utc>) -> Vec<OrderSnapshot> {
    vec![
        OrderSnapshot {
            tracking_id: "AWB123456".to_string(),
            status: OrderStatus::InTransit,
            last_update: now - Duration::hours(6),
            estimated_delivery: now + Duration::days(2),
            scheduled_delivery: None,
            delay_reason: None,
            customer_name: Some("Priya Sharma".to_string()),
            customer_phone: Some("+919876543210".to_string()),
            rescheduled: false,
        },
        OrderSnapshot {
            tracking_id: "AWB654321".to_string(),
            status: OrderStatus::OutForDelivery,
            last_update: now - Duration::hours(1),
            estimated_delivery: now + Duration::hours(8),
            scheduled_delivery: None,
            delay_reason: None,
            customer_name: Some("Rahul Verma".to_string()),
            customer_phone: Some("+919812345678".to_string()),
            rescheduled: false,
        },
        OrderSnapshot {
            tracking_id: "AWB111222".to_string(),
            status: OrderStatus::Delayed,
            last_update: now - Duration::days(1),
            estimated_delivery: now + Duration::days(4),
            scheduled_delivery: None,
            delay_reason: Some("Weather disruption at transit hub".to_string()),
            customer_name: Some("Anita Desai".to_string()),
            customer_phone: Some("+919900112233".to_string()),
            rescheduled: false,
        },
        OrderSnapshot {
            tracking_id: "AWB333444".to_string(),
            status: OrderStatus::Delivered,
            last_update: now - Duration::days(2),
            estimated_delivery: now - Duration::days(2),
            scheduled_delivery: None,
            delay_reason: None,
            customer_name: Some("Vikram Singh".to_string()),
            customer_phone: None,
            rescheduled: false,
        },
        OrderSnapshot {
            tracking_id: "AWB555666".to_string(),
            status: OrderStatus::Processing,
            last_update: now - Duration::hours(12),
            estimated_delivery: now + Duration::days(5),
            scheduled_delivery: None,
            delay_reason: None,
            customer_name: None,
            customer_phone: None,
            rescheduled: false,
        },
    ]
}
