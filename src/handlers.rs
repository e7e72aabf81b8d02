use crate::db_types::{MessageFilter, NewChatMessage, StatusUpdate};
use crate::error::{AppError, SendError};
use crate::export::messages_to_csv;
use crate::report::render_report;
use crate::store::ConversationStore;
use crate::twilio_types::{StatusCallbackParams, TwilioInboundMessage, TWIML_ACK};
use crate::types::AppState;
use crate::utils::{parse_end_filter, parse_start_filter, status_callback_url};

use axum::extract::{Host, Query, RawQuery, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub async fn health() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

/// Twilio → our server.  We answer with Gemini, save, then send the reply via
/// the Messages REST API.  The webhook always acks with fixed TwiML so Twilio
/// does not retry; only a Gemini failure (before anything is persisted) is
/// allowed to surface as a 500.
pub async fn whatsapp_webhook(
    Host(host): Host,
    State(app_state): State<Arc<AppState>>,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    let payload = match serde_urlencoded::from_str::<TwilioInboundMessage>(&body) {
        Ok(p) => p,
        Err(e) => {
            warn!(error=%e, "unparseable webhook body; treating fields as absent");
            TwilioInboundMessage::default()
        }
    };
    let user_text = payload.body();
    let from_phone = payload.from_phone();
    debug!(from=%from_phone, sid=%payload.message_sid(), "inbound whatsapp message");

    // 1) Ask Gemini
    let (reply_text, latency_ms) = app_state.responder.ask(&user_text).await?;

    // 2) Persist inbound + our response
    let cm = app_state
        .store
        .insert(NewChatMessage {
            message_sid: payload.message_sid(),
            account_sid: payload.account_sid.clone().unwrap_or_default(),
            sms_status: payload.sms_status.clone().unwrap_or_default(),
            message_type: payload.message_type.clone().unwrap_or_default(),
            num_media: payload.num_media(),
            num_segments: payload.num_segments(),
            wa_id: payload.wa_id.clone().unwrap_or_default(),
            profile_name: payload.profile_name.clone().unwrap_or_default(),
            api_version: payload.api_version.clone().unwrap_or_default(),
            channel_metadata: payload.channel_metadata(),
            from_phone: from_phone.clone(),
            to_phone: payload.to_phone(),
            user_text,
            response_text: reply_text.clone(),
            model_name: app_state.responder.model.clone(),
            temperature: app_state.responder.temperature,
            latency_ms,
        })
        .await?;

    // 3) Send the reply (explicit enqueue); failures are recorded, not raised
    let callback = status_callback_url(&host);
    let send_result = app_state
        .sender
        .send_message(&from_phone, &reply_text, None, Some(&callback))
        .await;
    record_send_outcome(&app_state.store, cm.id, send_result).await;

    // 4) Minimal TwiML so Twilio knows the webhook succeeded
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, "application/xml".parse().unwrap());
    Ok((headers, TWIML_ACK))
}

/// Record how the outbound send went.  The exchange is already persisted and
/// the webhook must ack no matter what happens after the send attempt, so
/// store errors here are logged, never propagated.
async fn record_send_outcome(
    store: &ConversationStore,
    id: i64,
    send_result: Result<String, SendError>,
) {
    let recorded = match send_result {
        Ok(sid) => store.mark_queued(id, &sid).await,
        Err(e) => {
            warn!(error=%e, kind=%e.kind(), id, "outbound send failed");
            store.mark_failed(id, &e.to_string()).await
        }
    };
    if let Err(e) = recorded {
        error!(error=%e, id, "failed to record send outcome");
    }
}

/// Twilio delivery status, GET variant (parameters in the query string).
pub async fn status_callback_get(
    State(app_state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> Result<&'static str, AppError> {
    let raw = query.unwrap_or_default();
    save_status(&app_state, &raw).await
}

/// Twilio delivery status, POST variant (parameters in the form body).
pub async fn status_callback_post(
    State(app_state): State<Arc<AppState>>,
    body: String,
) -> Result<&'static str, AppError> {
    save_status(&app_state, &body).await
}

async fn save_status(app_state: &AppState, raw: &str) -> Result<&'static str, AppError> {
    let params = match serde_urlencoded::from_str::<StatusCallbackParams>(raw) {
        Ok(p) => p,
        Err(e) => {
            warn!(error=%e, "unparseable status callback; treating fields as absent");
            StatusCallbackParams::default()
        }
    };
    let update = StatusUpdate {
        outbound_sid: params.outbound_sid(),
        status: params.status(),
        from_phone: params.from.clone().unwrap_or_default(),
        to_phone: params.to.clone().unwrap_or_default(),
        error_code: params.error_code(),
        error_message: params.error_message(),
    };
    match app_state.store.apply_status_update(&update).await? {
        Some(id) => info!(id, status=?update.status, "applied delivery status"),
        None => debug!(sid=%update.outbound_sid, "status callback matched nothing"),
    }
    Ok("OK")
}

#[derive(Deserialize, Debug, Default)]
pub struct ListParams {
    pub from_phone: Option<String>,
    pub to_phone: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

impl ListParams {
    /// Malformed date values are dropped, not rejected.
    pub fn into_filter(self) -> MessageFilter {
        MessageFilter {
            from_phone: self.from_phone.filter(|s| !s.is_empty()),
            to_phone: self.to_phone.filter(|s| !s.is_empty()),
            start: self.start.as_deref().and_then(parse_start_filter),
            end: self.end.as_deref().and_then(parse_end_filter),
        }
    }
}

/// Read-only list for dashboards/QA with simple filters.
pub async fn list_messages(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let filter = params.into_filter();
    let messages = app_state.store.list(&filter).await?;
    Ok(Json(messages))
}

/// CSV download of every message, newest first.
pub async fn export_csv(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let messages = app_state.store.all_newest_first().await?;
    let bytes = messages_to_csv(&messages)?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, "text/csv".parse().unwrap());
    headers.insert(
        header::CONTENT_DISPOSITION,
        "attachment; filename=\"chatmessages.csv\"".parse().unwrap(),
    );
    Ok((headers, bytes))
}

/// Explicit export-to-file operation, kept separate from the download path so
/// reads never race a shared on-disk write.
pub async fn export_csv_to_file(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let messages = app_state.store.all_newest_first().await?;
    let bytes = messages_to_csv(&messages)?;
    let path = &app_state.config.csv_export_path;
    tokio::fs::write(path, &bytes).await?;
    info!(path=%path, rows = messages.len(), "wrote csv export");
    Ok(Json(json!({ "ok": true, "path": path, "rows": messages.len() })))
}

#[derive(Deserialize, Debug)]
pub struct SendImageRequest {
    pub to: String,
    pub image_url: String,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct SendPdfRequest {
    pub to: String,
    pub pdf_url: String,
    #[serde(default)]
    pub caption: Option<String>,
}

fn media_send_response(result: Result<String, SendError>) -> (StatusCode, Json<serde_json::Value>) {
    match result {
        Ok(sid) => (StatusCode::OK, Json(json!({ "sid": sid, "status": "queued" }))),
        Err(e @ SendError::InvalidRecipient(_)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": e.to_string() })),
        ),
        Err(e) => {
            warn!(error=%e, "ad-hoc media send failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}

pub async fn send_image(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<SendImageRequest>,
) -> impl IntoResponse {
    let caption = req.caption.unwrap_or_default();
    let result = app_state
        .sender
        .send_media(&req.to, &req.image_url, &caption)
        .await;
    media_send_response(result)
}

pub async fn send_pdf(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<SendPdfRequest>,
) -> impl IntoResponse {
    let caption = req.caption.unwrap_or_default();
    let result = app_state
        .sender
        .send_media(&req.to, &req.pdf_url, &caption)
        .await;
    media_send_response(result)
}

/// Render the fixed HTML report to a timestamped PDF and return its relative
/// media path.  Render failures come back as a structured body, not a bare 500.
pub async fn convert_html_to_pdf(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    match render_report(&app_state.config).await {
        Ok(path) => (StatusCode::OK, Json(json!({ "ok": true, "pdf": path }))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "ok": false, "error": e.to_string() })),
        ),
    }
}
