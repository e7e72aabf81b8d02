use crate::config::Config;
use crate::error::AppError;
use crate::gemini_types::{Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part};

use std::time::Instant;
use tracing::{debug, error};

const SYSTEM_INSTRUCTIONS: &str = "You are Atom.Ai (a WhatsApp assistant). \
Reply with a SHORT, precise answer. Prefer bullet points when listing. \
Avoid long preambles.";

const DEFAULT_PROMPT: &str = "Hello";
const EMPTY_REPLY_FALLBACK: &str = "Sorry, I couldn't generate a response.";

/// Wrapper around the Gemini `generateContent` API.  Returns reply text plus
/// wall-clock latency; provider errors propagate to the caller uncaught.
pub struct GeminiResponder {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    pub model: String,
    pub temperature: f64,
    max_tokens: u32,
}

impl GeminiResponder {
    pub fn new(config: &Config, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            api_key: config.gemini_api_key.clone(),
            model: config.gemini_model.clone(),
            temperature: config.gemini_temperature,
            max_tokens: config.gemini_max_tokens,
        }
    }

    /// Ask Gemini for a reply to `user_text`.  Empty input becomes a fixed
    /// greeting prompt; an empty model response becomes a fixed apology.
    pub async fn ask(&self, user_text: &str) -> Result<(String, i32), AppError> {
        let text_in = user_text.trim();
        let text_in = if text_in.is_empty() { DEFAULT_PROMPT } else { text_in };

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let payload = GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: SYSTEM_INSTRUCTIONS.to_string(),
                }],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: text_in.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                top_p: 0.9,
                top_k: 32,
                max_output_tokens: self.max_tokens,
            },
        };

        let start = Instant::now();
        let resp = self
            .http_client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(error=%e, "failed to send request to gemini");
                AppError::Gemini(e)
            })?
            .error_for_status()
            .map_err(|e| {
                error!(error=%e, "gemini rejected generate request");
                AppError::Gemini(e)
            })?;
        let resp = resp.json::<GenerateContentResponse>().await.map_err(|e| {
            error!(error=%e, "failed to deserialize gemini response");
            AppError::Gemini(e)
        })?;
        let latency_ms = start.elapsed().as_millis() as i32;

        let reply = resp
            .text()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| EMPTY_REPLY_FALLBACK.to_string());
        debug!(latency_ms, "got gemini reply");

        Ok((reply, latency_ms))
    }
}
