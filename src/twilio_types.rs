use serde::Deserialize;

/// Minimal TwiML acknowledgment returned to every inbound webhook call so
/// Twilio considers the delivery handled and does not retry.
pub const TWIML_ACK: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response/>";

/// Form payload Twilio posts for an inbound WhatsApp message.  Every field is
/// optional on the wire; accessors below apply the documented defaults.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase")]
pub struct TwilioInboundMessage {
    pub body: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub message_sid: Option<String>,
    pub sms_message_sid: Option<String>,
    pub account_sid: Option<String>,
    pub sms_status: Option<String>,
    pub message_type: Option<String>,
    pub num_media: Option<String>,
    pub num_segments: Option<String>,
    pub wa_id: Option<String>,
    pub profile_name: Option<String>,
    pub api_version: Option<String>,
    pub channel_metadata: Option<String>,
}

fn or_empty(v: &Option<String>) -> String {
    v.clone().unwrap_or_default()
}

impl TwilioInboundMessage {
    pub fn body(&self) -> String {
        or_empty(&self.body).trim().to_string()
    }

    pub fn from_phone(&self) -> String {
        or_empty(&self.from)
    }

    pub fn to_phone(&self) -> String {
        or_empty(&self.to)
    }

    /// Inbound message identifier; some channels only populate `SmsMessageSid`.
    pub fn message_sid(&self) -> String {
        self.message_sid
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| self.sms_message_sid.clone())
            .unwrap_or_default()
    }

    pub fn num_media(&self) -> i32 {
        self.num_media
            .as_deref()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    pub fn num_segments(&self) -> i32 {
        self.num_segments
            .as_deref()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1)
    }

    /// Channel metadata is an opaque JSON blob.  Anything that fails to parse
    /// is kept under a `raw` key rather than dropped.
    pub fn channel_metadata(&self) -> Option<serde_json::Value> {
        let raw = self.channel_metadata.as_deref()?;
        if raw.is_empty() {
            return None;
        }
        match serde_json::from_str(raw) {
            Ok(v) => Some(v),
            Err(_) => Some(serde_json::json!({ "raw": raw })),
        }
    }
}

/// Parameters of a Twilio delivery-status callback, arriving either as query
/// parameters (GET) or a form body (POST).
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase")]
pub struct StatusCallbackParams {
    pub message_sid: Option<String>,
    pub sms_sid: Option<String>,
    pub message_status: Option<String>,
    pub sms_status: Option<String>,
    pub to: Option<String>,
    pub from: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.is_empty())
}

impl StatusCallbackParams {
    pub fn outbound_sid(&self) -> String {
        non_empty(self.message_sid.clone())
            .or_else(|| self.sms_sid.clone())
            .unwrap_or_default()
    }

    pub fn status(&self) -> Option<String> {
        non_empty(self.message_status.clone()).or_else(|| non_empty(self.sms_status.clone()))
    }

    pub fn error_code(&self) -> Option<String> {
        non_empty(self.error_code.clone())
    }

    pub fn error_message(&self) -> Option<String> {
        non_empty(self.error_message.clone())
    }
}

/// Successful response body from the Messages create API.
#[derive(Deserialize, Debug)]
pub struct MessageResource {
    pub sid: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Twilio's structured error body for rejected API calls.
#[derive(Deserialize, Debug, Default)]
pub struct TwilioErrorBody {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_payload_defaults() {
        let msg: TwilioInboundMessage = serde_urlencoded::from_str("").unwrap();
        assert_eq!(msg.body(), "");
        assert_eq!(msg.from_phone(), "");
        assert_eq!(msg.message_sid(), "");
        assert_eq!(msg.num_media(), 0);
        assert_eq!(msg.num_segments(), 1);
        assert!(msg.channel_metadata().is_none());
    }

    #[test]
    fn inbound_payload_full() {
        let body = "Body=+hi+there+&From=whatsapp%3A%2B1555&To=whatsapp%3A%2B1444\
                    &MessageSid=SM123&NumMedia=2&NumSegments=3&ProfileName=Ana";
        let msg: TwilioInboundMessage = serde_urlencoded::from_str(body).unwrap();
        assert_eq!(msg.body(), "hi there");
        assert_eq!(msg.from_phone(), "whatsapp:+1555");
        assert_eq!(msg.to_phone(), "whatsapp:+1444");
        assert_eq!(msg.message_sid(), "SM123");
        assert_eq!(msg.num_media(), 2);
        assert_eq!(msg.num_segments(), 3);
        assert_eq!(msg.profile_name.as_deref(), Some("Ana"));
    }

    #[test]
    fn inbound_sid_falls_back_to_sms_message_sid() {
        let msg: TwilioInboundMessage =
            serde_urlencoded::from_str("SmsMessageSid=SM999").unwrap();
        assert_eq!(msg.message_sid(), "SM999");
    }

    #[test]
    fn channel_metadata_bad_json_kept_raw() {
        let msg: TwilioInboundMessage =
            serde_urlencoded::from_str("ChannelMetadata=not-json").unwrap();
        let meta = msg.channel_metadata().unwrap();
        assert_eq!(meta["raw"], "not-json");
    }

    #[test]
    fn status_params_alias_resolution() {
        let p: StatusCallbackParams =
            serde_urlencoded::from_str("SmsSid=SM1&SmsStatus=delivered").unwrap();
        assert_eq!(p.outbound_sid(), "SM1");
        assert_eq!(p.status().as_deref(), Some("delivered"));

        let p: StatusCallbackParams =
            serde_urlencoded::from_str("MessageSid=SM2&MessageStatus=failed&ErrorCode=30008")
                .unwrap();
        assert_eq!(p.outbound_sid(), "SM2");
        assert_eq!(p.status().as_deref(), Some("failed"));
        assert_eq!(p.error_code().as_deref(), Some("30008"));
        assert!(p.error_message().is_none());
    }

    #[test]
    fn twiml_ack_shape() {
        assert!(TWIML_ACK.ends_with("<Response/>"));
    }
}
