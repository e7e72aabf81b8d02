use serde::Serialize;
use sqlx::types::time::OffsetDateTime;

/// One row per inbound WhatsApp message, together with the generated reply and
/// its delivery lifecycle.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ChatMessage {
    pub id: i64,

    // Inbound (from the Twilio webhook)
    pub message_sid: String,
    pub account_sid: Option<String>,
    pub sms_status: Option<String>,
    pub message_type: Option<String>,
    pub num_media: i32,
    pub num_segments: i32,
    pub wa_id: Option<String>,
    pub profile_name: Option<String>,
    pub api_version: Option<String>,
    pub channel_metadata: Option<serde_json::Value>,

    // Phones & text
    pub from_phone: String,
    pub to_phone: String,
    pub user_text: Option<String>,

    // Gemini output + metrics
    pub response_text: Option<String>,
    pub model_name: String,
    pub temperature: f64,
    pub latency_ms: i32,

    // Outbound send (REST API)
    pub outbound_message_sid: Option<String>,
    pub delivery_status: Option<String>,
    pub delivery_error_code: Option<String>,
    pub delivery_error_message: Option<String>,

    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Insert payload for a new exchange, built by the webhook handler.
#[derive(Debug, Default)]
pub struct NewChatMessage {
    pub message_sid: String,
    pub account_sid: String,
    pub sms_status: String,
    pub message_type: String,
    pub num_media: i32,
    pub num_segments: i32,
    pub wa_id: String,
    pub profile_name: String,
    pub api_version: String,
    pub channel_metadata: Option<serde_json::Value>,
    pub from_phone: String,
    pub to_phone: String,
    pub user_text: String,
    pub response_text: String,
    pub model_name: String,
    pub temperature: f64,
    pub latency_ms: i32,
}

/// Fields extracted from a Twilio status callback.  `None` means "not present
/// in the payload, keep the stored value".
#[derive(Debug)]
pub struct StatusUpdate {
    pub outbound_sid: String,
    pub status: Option<String>,
    pub from_phone: String,
    pub to_phone: String,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

/// Filters for the read-only message listing.  Date bounds are already parsed;
/// malformed query values never make it this far.
#[derive(Debug, Default)]
pub struct MessageFilter {
    pub from_phone: Option<String>,
    pub to_phone: Option<String>,
    pub start: Option<OffsetDateTime>,
    pub end: Option<OffsetDateTime>,
}
