use std::env;

/// Process-scoped configuration, read once at startup and handed to `AppState`.
/// Everything that used to live in scattered env lookups goes through here so
/// tests can construct a `Config` by hand.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,

    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub gemini_temperature: f64,
    pub gemini_max_tokens: u32,

    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_base_url: String,
    /// Sending number, e.g. `whatsapp:+14155238886`.
    pub whatsapp_from: String,

    pub csv_export_path: String,
    pub reports_dir: String,
    pub wkhtmltopdf_path: String,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Config {
    /// Read configuration from the environment.  Required variables panic with a
    /// clear message; the rest fall back to sensible defaults.
    pub fn from_env() -> Self {
        Self {
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:3000"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL not set!"),
            gemini_api_key: env::var("GEMINI_API_KEY").expect("GEMINI_API_KEY not set!"),
            gemini_base_url: var_or(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            gemini_model: var_or("GEMINI_MODEL", "gemini-1.5-flash"),
            gemini_temperature: var_or("GEMINI_TEMPERATURE", "0.2")
                .parse()
                .expect("GEMINI_TEMPERATURE must be a float"),
            gemini_max_tokens: var_or("GEMINI_MAX_TOKENS", "512")
                .parse()
                .expect("GEMINI_MAX_TOKENS must be an integer"),
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID").expect("TWILIO_ACCOUNT_SID not set!"),
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN").expect("TWILIO_AUTH_TOKEN not set!"),
            twilio_base_url: var_or("TWILIO_BASE_URL", "https://api.twilio.com"),
            whatsapp_from: env::var("WHATSAPP_FROM").expect("WHATSAPP_FROM not set!"),
            csv_export_path: var_or("CSV_EXPORT_PATH", "chatmessages.csv"),
            reports_dir: var_or("REPORTS_DIR", "reports"),
            wkhtmltopdf_path: var_or("WKHTMLTOPDF_PATH", "wkhtmltopdf"),
        }
    }
}

#[cfg(test)]
impl Config {
    /// Minimal config for unit tests; callers override what they exercise.
    pub fn for_tests() -> Self {
        Self {
            bind_addr: "127.0.0.1:0".to_string(),
            database_url: String::new(),
            gemini_api_key: "test-key".to_string(),
            gemini_base_url: "http://127.0.0.1:0".to_string(),
            gemini_model: "gemini-1.5-flash".to_string(),
            gemini_temperature: 0.2,
            gemini_max_tokens: 512,
            twilio_account_sid: "ACtest".to_string(),
            twilio_auth_token: "token".to_string(),
            twilio_base_url: "http://127.0.0.1:0".to_string(),
            whatsapp_from: "whatsapp:+14155238886".to_string(),
            csv_export_path: "chatmessages.csv".to_string(),
            reports_dir: "reports".to_string(),
            wkhtmltopdf_path: "wkhtmltopdf".to_string(),
        }
    }
}
