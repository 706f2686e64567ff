//! Conversation engine
//!
//! Consumes one message at a time per session, consults the intent
//! resolver and order store, mutates the session, and emits a structured
//! [`Reply`]. Processing follows a strict priority order: expiry, OTP
//! gate, slot selection, tracking-id extraction, verification gate, and
//! finally intent dispatch.

mod otp;
mod reply;
mod reschedule;
#[cfg(test)]
pub mod testing;

pub use reply::Reply;

use crate::notify::Notifier;
use crate::orders::{OrderSnapshot, OrderStore};
use crate::resolver::{IntentAction, IntentResolver};
use crate::session::{ConvState, Resolved, Session, SessionStore};
use regex::Regex;
use reply::format_order_details;
use std::sync::{Arc, OnceLock};
use tokio::time::Instant;

const GREETING_REPLY: &str =
    "Hello! I can help you track a shipment or reschedule a delivery. \
     Share your tracking id (AWB followed by six digits) to get started.";

const FALLBACK_REPLY: &str =
    "Sorry, I didn't catch that. You can ask about your order's status, \
     request full details, or reschedule a delivery.";

const DEPENDENCY_FAILURE_REPLY: &str =
    "Sorry, something went wrong on our side. Please try again in a moment.";

fn awb_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\bAWB\d{6}\b").expect("valid AWB pattern"))
}

/// Pull a normalized tracking id out of free text
fn extract_tracking_id(text: &str) -> Option<String> {
    awb_pattern()
        .find(text)
        .map(|m| m.as_str().to_ascii_uppercase())
}

/// The per-message state machine driver
pub struct Engine<R, O, N> {
    sessions: Arc<SessionStore>,
    resolver: R,
    orders: O,
    notifier: N,
}

impl<R, O, N> Engine<R, O, N>
where
    R: IntentResolver,
    O: OrderStore,
    N: Notifier,
{
    pub fn new(sessions: Arc<SessionStore>, resolver: R, orders: O, notifier: N) -> Self {
        Self {
            sessions,
            resolver,
            orders,
            notifier,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Process one message for one session
    pub async fn handle_message(&self, session_id: &str, text: &str) -> Reply {
        // resolve -> process -> commit is a read-modify-write on the
        // session record; a second in-flight message for the same id must
        // wait or its updates would be lost on commit.
        let guard = self.sessions.guard(session_id);
        let _serialized = guard.lock().await;

        let mut session = match self.sessions.resolve(session_id) {
            Resolved::Expired => {
                tracing::info!(session_id = %session_id, "Message for expired session");
                return Reply::session_expired();
            }
            Resolved::Active(session) => session,
            Resolved::Missing => self.sessions.create(session_id),
        };

        let reply = self.process(&mut session, text.trim()).await;
        self.sessions.commit(session);
        reply
    }

    async fn process(&self, session: &mut Session, text: &str) -> Reply {
        // OTP gate: while a challenge is outstanding nothing else runs.
        if session.state == ConvState::AwaitingOtp && !session.otp_verified {
            return self.check_otp(session, text);
        }

        // Slot selection while options are on the table.
        if session.state == ConvState::RescheduleOptions && !session.pending_options.is_empty() {
            return self.apply_selection(session, text).await;
        }

        // A tracking id anywhere in the message always triggers a fresh
        // lookup; cached snapshots may carry stale reschedule state.
        if let Some(tracking_id) = extract_tracking_id(text) {
            return self.lookup_order(session, &tracking_id).await;
        }

        // Verification gate: an order in context is invisible until the
        // caller proves the OTP.
        if session.order.is_some() && !session.otp_verified {
            session.set_state(ConvState::AwaitingOtp);
            return Reply::new(
                "Please enter the 6-digit verification code sent to your registered phone.",
                ConvState::AwaitingOtp,
            )
            .requires_otp();
        }

        self.dispatch_intent(session, text).await
    }

    // ========================================================================
    // OTP
    // ========================================================================

    fn check_otp(&self, session: &mut Session, text: &str) -> Reply {
        match otp::check(session.otp.as_ref(), text, Instant::now()) {
            otp::OtpCheck::NotSixDigits => Reply::new(
                "That doesn't look like a verification code. Please enter the 6-digit code.",
                ConvState::AwaitingOtp,
            )
            .requires_otp(),
            otp::OtpCheck::Valid => {
                session.otp = None;
                session.otp_verified = true;
                session.set_state(ConvState::OrderFound);
                let response = match &session.order {
                    Some(order) => format!(
                        "You're verified. Order {} is currently {}.",
                        order.tracking_id, order.status
                    ),
                    None => "You're verified.".to_string(),
                };
                Reply::new(response, ConvState::OrderFound)
            }
            otp::OtpCheck::Mismatch | otp::OtpCheck::WindowClosed => {
                tracing::info!(session_id = %session.id, "OTP verification failed");
                session.clear_otp();
                // Drop the order context too: back to INITIAL means the
                // caller re-identifies the order, which issues a new code.
                session.order = None;
                session.set_state(ConvState::Initial);
                Reply::new(
                    "That code is invalid or has expired. Please share your tracking id again to receive a new one.",
                    ConvState::Initial,
                )
            }
        }
    }

    async fn issue_otp(&self, session: &mut Session, order: OrderSnapshot) -> Reply {
        let challenge = otp::issue(Instant::now());
        let code = challenge.code.clone();
        let phone = order.customer_phone.clone();

        session.order = Some(order);
        session.otp_verified = false;
        session.otp = Some(challenge);
        session.set_state(ConvState::AwaitingOtp);

        let sent = match phone {
            Some(phone) => {
                self.notifier
                    .send(&phone, &format!("Your parceldesk verification code is {code}."))
                    .await
            }
            None => false,
        };

        Reply::new(
            "Found your order. For security, please enter the 6-digit verification code we just sent to your registered phone.",
            ConvState::AwaitingOtp,
        )
        .requires_otp()
        .whatsapp_sent(sent)
    }

    // ========================================================================
    // Order lookup
    // ========================================================================

    async fn lookup_order(&self, session: &mut Session, tracking_id: &str) -> Reply {
        let fetched = match self.orders.get(tracking_id).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::error!(error = %e, tracking_id = %tracking_id, "Order store lookup failed");
                session.set_state(ConvState::Initial);
                return Reply::new(DEPENDENCY_FAILURE_REPLY, ConvState::Initial);
            }
        };

        let Some(order) = fetched else {
            let response =
                format!("I couldn't find an order with tracking id {tracking_id}. Please double-check it.");
            return Reply::new(response, session.state).requires_awb();
        };

        let already_verified = session.otp_verified
            && session
                .order
                .as_ref()
                .is_some_and(|o| o.tracking_id == order.tracking_id);

        if already_verified {
            // Same order, already proven: refresh the snapshot and answer.
            let response = format!(
                "Order {} is currently {}.",
                order.tracking_id, order.status
            );
            session.order = Some(order);
            session.set_state(ConvState::OrderFound);
            return Reply::new(response, ConvState::OrderFound);
        }

        self.issue_otp(session, order).await
    }

    // ========================================================================
    // Reschedule selection
    // ========================================================================

    async fn apply_selection(&self, session: &mut Session, text: &str) -> Reply {
        let count = session.pending_options.len();
        let Some(index) = reschedule::parse_selection(text, count) else {
            let response = format!("Please reply with a number between 1 and {count} to pick a slot.");
            return Reply::new(response, ConvState::RescheduleOptions).requires_reschedule();
        };

        let option = session.pending_options[index].clone();
        let tracking_id = match &session.order {
            Some(order) => order.tracking_id.clone(),
            None => {
                // Options without an order should be unreachable; recover
                // instead of guessing.
                session.set_state(ConvState::Initial);
                return Reply::new(FALLBACK_REPLY, ConvState::Initial);
            }
        };

        let applied = match self.orders.reschedule(&tracking_id, option.date).await {
            Ok(applied) => applied,
            Err(e) => {
                tracing::error!(error = %e, tracking_id = %tracking_id, "Reschedule write failed");
                false
            }
        };
        if !applied {
            // Options stay on the table so the caller can retry the same
            // pick without re-deriving them.
            return Reply::new(
                "I couldn't save that slot just now. Please try the same selection again.",
                ConvState::RescheduleOptions,
            )
            .requires_reschedule();
        }

        let refreshed = self.orders.get(&tracking_id).await.ok().flatten();
        if let Some(order) = refreshed {
            session.order = Some(order);
        }
        session.set_state(ConvState::OrderFound);

        let sent = match session.order.as_ref().and_then(|o| o.customer_phone.clone()) {
            Some(phone) => {
                self.notifier
                    .send(
                        &phone,
                        &format!(
                            "Your delivery for {tracking_id} has been rescheduled to {}.",
                            option.label
                        ),
                    )
                    .await
            }
            None => false,
        };

        let details = session.order.as_ref().map(format_order_details);
        let mut reply = Reply::new(
            format!("Done! Your delivery is rescheduled to {}.", option.label),
            ConvState::OrderFound,
        )
        .whatsapp_sent(sent);
        if let Some(details) = details {
            reply = reply.with_order_details(details);
        }
        reply
    }

    fn offer_reschedule(&self, session: &mut Session) -> Reply {
        let Some(order) = session.order.clone() else {
            session.set_state(ConvState::AwaitingAwb);
            return Reply::new(
                "Sure - which order? Please share your tracking id (AWB followed by six digits).",
                ConvState::AwaitingAwb,
            )
            .requires_awb();
        };

        if !order.is_reschedulable() {
            let response = if order.rescheduled {
                format!(
                    "Order {} has already been rescheduled once; I can't move it again.",
                    order.tracking_id
                )
            } else {
                format!(
                    "Order {} is {} and can no longer be rescheduled.",
                    order.tracking_id, order.status
                )
            };
            return Reply::new(response, ConvState::OrderFound);
        }

        let options = reschedule::generate_options(chrono::Utc::now());
        let labels: Vec<String> = options
            .iter()
            .enumerate()
            .map(|(i, o)| format!("{}. {}", i + 1, o.label))
            .collect();
        session.set_state(ConvState::RescheduleOptions);
        session.pending_options = options;

        Reply::new(
            format!(
                "Here are the available slots:\n{}\nReply with 1, 2 or 3 to pick one.",
                labels.join("\n")
            ),
            ConvState::RescheduleOptions,
        )
        .requires_reschedule()
        .with_reschedule_options(labels)
    }

    // ========================================================================
    // Intent dispatch
    // ========================================================================

    async fn dispatch_intent(&self, session: &mut Session, text: &str) -> Reply {
        let outcome = match self
            .resolver
            .resolve(text, session.state, session.order.as_ref())
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    session_id = %session.id,
                    retryable = e.kind.is_retryable(),
                    "Intent resolution failed"
                );
                session.set_state(ConvState::Initial);
                return Reply::new(DEPENDENCY_FAILURE_REPLY, ConvState::Initial);
            }
        };

        // The resolver sometimes spots a tracking id the regex pass missed
        // (reworded or spaced out); treat that as a lookup.
        if session.order.is_none() {
            if let Some(tracking_id) = outcome
                .tracking_id
                .as_deref()
                .and_then(extract_tracking_id)
            {
                return self.lookup_order(session, &tracking_id).await;
            }
        }

        match (outcome.action, session.order.clone()) {
            (IntentAction::OrderStatus | IntentAction::OrderDetails, None) => {
                session.set_state(ConvState::AwaitingAwb);
                Reply::new(
                    "Please share your tracking id (AWB followed by six digits) so I can look that up.",
                    ConvState::AwaitingAwb,
                )
                .requires_awb()
            }
            (IntentAction::OrderStatus, Some(order)) => {
                let mut response = format!(
                    "Order {} is currently {}.",
                    order.tracking_id, order.status
                );
                if let Some(reason) = &order.delay_reason {
                    response.push_str(&format!(" Note: {reason}."));
                }
                session.set_state(ConvState::OrderFound);
                Reply::new(response, ConvState::OrderFound)
            }
            (IntentAction::OrderDetails, Some(order)) => {
                let details = format_order_details(&order);
                session.set_state(ConvState::OrderFound);
                Reply::new("Here are your order details.", ConvState::OrderFound)
                    .show_details()
                    .with_order_details(details)
            }
            (IntentAction::OrderReschedule, _) => self.offer_reschedule(session),
            (IntentAction::Greeting, _) => {
                session.set_state(ConvState::Initial);
                Reply::new(GREETING_REPLY, ConvState::Initial)
            }
            (IntentAction::Farewell, _) => {
                session.set_state(ConvState::Completed);
                Reply::new(
                    "Thanks for using parceldesk. Goodbye!",
                    ConvState::Completed,
                )
                .end_conversation()
            }
            (IntentAction::None, _) => {
                session.set_state(ConvState::Initial);
                Reply::new(FALLBACK_REPLY, ConvState::Initial)
            }
        }
    }
}
