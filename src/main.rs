mod config;
mod db_types;
mod error;
mod export;
mod gemini_types;
mod handlers;
mod report;
mod responder;
mod sender;
mod store;
mod twilio_types;
mod types;
mod utils;

use crate::config::Config;
use crate::responder::GeminiResponder;
use crate::sender::TwilioSender;
use crate::store::ConversationStore;
use crate::types::AppState;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let subscriber = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_file(true)
                .with_line_number(true),
        )
        .with(tracing_subscriber::filter::Targets::new().with_targets([
            ("hyper", tracing_subscriber::filter::LevelFilter::OFF),
            (
                "whatsapp_chat_rs",
                tracing_subscriber::filter::LevelFilter::DEBUG,
            ),
        ]));
    tracing::subscriber::set_global_default(subscriber).unwrap();

    let config = Config::from_env();

    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("failed to run migrations");

    let http_client = reqwest::Client::new();
    let responder = GeminiResponder::new(&config, http_client.clone());
    let sender = TwilioSender::new(&config, http_client);
    let store = ConversationStore::new(db_pool);
    let bind_addr = config.bind_addr.clone();

    let app_state = Arc::new(AppState {
        config,
        store,
        responder,
        sender,
    });

    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/webhook", post(handlers::whatsapp_webhook))
        .route(
            "/status",
            get(handlers::status_callback_get).post(handlers::status_callback_post),
        )
        .route("/messages", get(handlers::list_messages))
        .route(
            "/save_messages_csv",
            get(handlers::export_csv).post(handlers::export_csv_to_file),
        )
        .route("/send_image", post(handlers::send_image))
        .route("/send_pdf", post(handlers::send_pdf))
        .route("/convert_Html2PDF", post(handlers::convert_html_to_pdf))
        .with_state(app_state);

    axum::Server::bind(&bind_addr.parse().expect("invalid BIND_ADDR"))
        .serve(app.into_make_service())
        .await
        .unwrap();
}
