//! Conversation sessions
//!
//! A session is one caller's conversation: its state-machine position, the
//! order snapshot it is allowed to see, any pending OTP challenge, and the
//! reschedule options on offer. Sessions are short-lived and in-memory only.

mod store;

pub use store::{Resolved, SessionStore};

use crate::orders::OrderSnapshot;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Inactivity window after which a session expires
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// How long an issued OTP stays valid
pub const OTP_TTL: Duration = Duration::from_secs(120);

/// Cadence of the background expiry sweep
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// How long an expired session id is remembered so late messages get an
/// explicit expiry reply instead of silently starting over
pub const EXPIRED_MARKER_TTL: Duration = Duration::from_secs(300);

/// Number of reschedule slots offered
pub const RESCHEDULE_OPTION_COUNT: usize = 3;

/// Conversation state machine positions
///
/// `SessionExpired` is synthetic: it appears on the wire but is never
/// stored in a session record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConvState {
    Initial,
    AwaitingAwb,
    AwaitingOtp,
    OrderFound,
    RescheduleOptions,
    Completed,
    SessionExpired,
}

impl ConvState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConvState::Initial => "INITIAL",
            ConvState::AwaitingAwb => "AWAITING_AWB",
            ConvState::AwaitingOtp => "AWAITING_OTP",
            ConvState::OrderFound => "ORDER_FOUND",
            ConvState::RescheduleOptions => "RESCHEDULE_OPTIONS",
            ConvState::Completed => "COMPLETED",
            ConvState::SessionExpired => "SESSION_EXPIRED",
        }
    }
}

/// A delivery slot offered during rescheduling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescheduleOption {
    pub date: chrono::DateTime<chrono::Utc>,
    pub label: String,
}

/// An issued one-time passcode awaiting verification
#[derive(Debug, Clone)]
pub struct OtpChallenge {
    pub code: String,
    pub issued_at: Instant,
}

impl OtpChallenge {
    pub fn is_within_window(&self, now: Instant) -> bool {
        now.duration_since(self.issued_at) <= OTP_TTL
    }
}

/// One caller's conversation record
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub state: ConvState,
    pub order: Option<OrderSnapshot>,
    pub pending_options: Vec<RescheduleOption>,
    pub otp: Option<OtpChallenge>,
    pub otp_verified: bool,
    pub last_active_at: Instant,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: ConvState::Initial,
            order: None,
            pending_options: Vec::new(),
            otp: None,
            otp_verified: false,
            last_active_at: Instant::now(),
        }
    }

    /// Transition to a new state, clearing pending reschedule options on
    /// any move out of `RescheduleOptions`.
    pub fn set_state(&mut self, state: ConvState) {
        if self.state == ConvState::RescheduleOptions && state != ConvState::RescheduleOptions {
            self.pending_options.clear();
        }
        self.state = state;
    }

    /// Discard any OTP challenge and verification
    pub fn clear_otp(&mut self) {
        self.otp = None;
        self.otp_verified = false;
    }

    pub fn is_idle_expired(&self, now: Instant) -> bool {
        now.duration_since(self.last_active_at) > IDLE_TIMEOUT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn leaving_reschedule_options_clears_pending_list() {
        let mut session = Session::new("s1");
        session.set_state(ConvState::RescheduleOptions);
        session.pending_options.push(RescheduleOption {
            date: chrono::Utc::now(),
            label: "Mon Jan 6, Morning".to_string(),
        });

        session.set_state(ConvState::OrderFound);
        assert!(session.pending_options.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn staying_in_reschedule_options_keeps_pending_list() {
        let mut session = Session::new("s1");
        session.set_state(ConvState::RescheduleOptions);
        session.pending_options.push(RescheduleOption {
            date: chrono::Utc::now(),
            label: "Mon Jan 6, Morning".to_string(),
        });

        session.set_state(ConvState::RescheduleOptions);
        assert_eq!(session.pending_options.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn otp_window_closes_after_ttl() {
        let challenge = OtpChallenge {
            code: "482193".to_string(),
            issued_at: Instant::now(),
        };
        assert!(challenge.is_within_window(Instant::now()));

        tokio::time::advance(OTP_TTL + Duration::from_secs(1)).await;
        assert!(!challenge.is_within_window(Instant::now()));
    }
}
