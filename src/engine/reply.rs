//! Structured replies returned to the gateway

use crate::orders::OrderSnapshot;
use crate::session::ConvState;
use serde::Serialize;

#[allow(clippy::trivially_copy_pass_by_ref)] // serde skip_serializing_if signature
fn is_false(b: &bool) -> bool {
    !*b
}

/// One reply in the conversation, serialized straight onto the wire
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub response: String,
    pub conversation_state: ConvState,
    #[serde(skip_serializing_if = "is_false")]
    pub requires_awb: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub requires_reschedule: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub show_details: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub end_conversation: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub requires_otp: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub session_expired: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reschedule_options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "is_false")]
    pub whatsapp_sent: bool,
}

impl Reply {
    pub fn new(response: impl Into<String>, state: ConvState) -> Self {
        Self {
            response: response.into(),
            conversation_state: state,
            requires_awb: false,
            requires_reschedule: false,
            show_details: false,
            end_conversation: false,
            requires_otp: false,
            session_expired: false,
            order_details: None,
            reschedule_options: None,
            whatsapp_sent: false,
        }
    }

    pub fn session_expired() -> Self {
        let mut reply = Self::new(
            "This session has expired due to inactivity. Please start a new conversation.",
            ConvState::SessionExpired,
        );
        reply.session_expired = true;
        reply.end_conversation = true;
        reply
    }

    pub fn requires_awb(mut self) -> Self {
        self.requires_awb = true;
        self
    }

    pub fn requires_reschedule(mut self) -> Self {
        self.requires_reschedule = true;
        self
    }

    pub fn show_details(mut self) -> Self {
        self.show_details = true;
        self
    }

    pub fn end_conversation(mut self) -> Self {
        self.end_conversation = true;
        self
    }

    pub fn requires_otp(mut self) -> Self {
        self.requires_otp = true;
        self
    }

    pub fn with_order_details(mut self, details: impl Into<String>) -> Self {
        self.order_details = Some(details.into());
        self
    }

    pub fn with_reschedule_options(mut self, options: Vec<String>) -> Self {
        self.reschedule_options = Some(options);
        self
    }

    pub fn whatsapp_sent(mut self, sent: bool) -> Self {
        self.whatsapp_sent = sent;
        self
    }
}

/// Render the full order summary shown once a caller is verified
pub fn format_order_details(order: &OrderSnapshot) -> String {
    let mut lines = vec![
        format!("Tracking ID: {}", order.tracking_id),
        format!("Status: {}", order.status),
        format!("Last update: {}", order.last_update.format("%a %b %-d, %H:%M UTC")),
        format!(
            "Estimated delivery: {}",
            order.estimated_delivery.format("%a %b %-d")
        ),
    ];
    if let Some(scheduled) = order.scheduled_delivery {
        lines.push(format!(
            "Scheduled delivery: {}",
            scheduled.format("%a %b %-d, %H:%M UTC")
        ));
    }
    if let Some(reason) = &order.delay_reason {
        lines.push(format!("Delay reason: {reason}"));
    }
    if let Some(name) = &order.customer_name {
        lines.push(format!("Recipient: {name}"));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn false_flags_and_empty_options_are_omitted() {
        let reply = Reply::new("hello", ConvState::Initial);
        let json = serde_json::to_value(&reply).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(obj["response"], "hello");
        assert_eq!(obj["conversationState"], "INITIAL");
    }

    #[test]
    fn set_flags_serialize_camel_case() {
        let reply = Reply::new("code sent", ConvState::AwaitingOtp)
            .requires_otp()
            .whatsapp_sent(true);
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["requiresOtp"], true);
        assert_eq!(json["whatsappSent"], true);
        assert_eq!(json["conversationState"], "AWAITING_OTP");
    }

    #[test]
    fn expired_reply_ends_conversation() {
        let reply = Reply::session_expired();
        assert!(reply.session_expired);
        assert!(reply.end_conversation);
        assert_eq!(reply.conversation_state, ConvState::SessionExpired);
    }
}
