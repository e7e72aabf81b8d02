use crate::config::Config;
use crate::error::SendError;
use crate::twilio_types::{MessageResource, TwilioErrorBody};

use std::collections::HashMap;
use tracing::{debug, error};

/// Twilio error codes for recipient problems (invalid number, not a WhatsApp
/// number, unreachable channel address).
const INVALID_RECIPIENT_CODES: &[i64] = &[21211, 21606, 21614];

/// Wrapper around the Twilio Messages create API.
pub struct TwilioSender {
    http_client: reqwest::Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    /// Sending number, e.g. `whatsapp:+14155238886`.
    pub from: String,
}

impl TwilioSender {
    pub fn new(config: &Config, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            base_url: config.twilio_base_url.trim_end_matches('/').to_string(),
            account_sid: config.twilio_account_sid.clone(),
            auth_token: config.twilio_auth_token.clone(),
            from: config.whatsapp_from.clone(),
        }
    }

    /// Enqueue an outbound message and return its sid.  `status_callback`
    /// points Twilio's delivery postbacks at our `/status` handler.
    pub async fn send_message(
        &self,
        to: &str,
        body: &str,
        media_url: Option<&str>,
        status_callback: Option<&str>,
    ) -> Result<String, SendError> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        );
        let mut form = HashMap::new();
        form.insert("From", self.from.as_str());
        form.insert("To", to);
        form.insert("Body", body);
        if let Some(media_url) = media_url {
            form.insert("MediaUrl", media_url);
        }
        if let Some(status_callback) = status_callback {
            form.insert("StatusCallback", status_callback);
        }

        let resp = self
            .http_client
            .post(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                error!(error=%e, "failed to send message request to twilio");
                SendError::Network(e.to_string())
            })?;

        let status = resp.status();
        if status.is_success() {
            let msg = resp.json::<MessageResource>().await.map_err(|e| {
                error!(error=%e, "failed to deserialize twilio message resource");
                SendError::Network(e.to_string())
            })?;
            debug!(sid=%msg.sid, status=?msg.status, "twilio accepted outbound message");
            return Ok(msg.sid);
        }

        let body = resp.text().await.unwrap_or_default();
        let err = serde_json::from_str::<TwilioErrorBody>(&body).unwrap_or_default();
        let message = err.message.unwrap_or(body);
        error!(status=%status, message=%message, "twilio rejected outbound message");
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(SendError::Auth(message));
        }
        match err.code {
            Some(code) if INVALID_RECIPIENT_CODES.contains(&code) => {
                Err(SendError::InvalidRecipient(message))
            }
            code => Err(SendError::Api {
                code: code.unwrap_or_else(|| status.as_u16().into()),
                message,
            }),
        }
    }

    /// Single-shot media send used by the ad-hoc endpoints; validates shapes
    /// before touching the API.
    pub async fn send_media(
        &self,
        to: &str,
        media_url: &str,
        caption: &str,
    ) -> Result<String, SendError> {
        if !is_whatsapp_address(to) {
            return Err(SendError::InvalidRecipient(format!(
                "'{to}' is not a whatsapp:+<digits> address"
            )));
        }
        if !is_public_secure_url(media_url) {
            return Err(SendError::InvalidRecipient(format!(
                "'{media_url}' is not a public https URL"
            )));
        }
        self.send_message(to, caption, Some(media_url), None).await
    }
}

/// `whatsapp:+<digits>` and nothing else.
pub fn is_whatsapp_address(to: &str) -> bool {
    match to.strip_prefix("whatsapp:+") {
        Some(digits) => !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// Media URLs must be https and resolvable to a host; Twilio fetches them.
pub fn is_public_secure_url(url: &str) -> bool {
    match reqwest::Url::parse(url) {
        Ok(u) => u.scheme() == "https" && u.host_str().is_some(),
        Err(_) => false,
    }
}
