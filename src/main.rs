//! Voice DM - spoken dialogue manager
//!
//! Runs a slot-filling dialogue (appointment booking or a fungus guessing
//! game) as a pure state machine, with the browser acting as the speech
//! recognizer and synthesizer.

mod api;
mod config;
mod matcher;
mod policy;
mod runtime;
mod slots;
mod state_machine;
mod validators;

use api::{create_router, AppState};
use config::{Lexicon, Settings};
use policy::Policy;
use runtime::{AdapterSettings, SessionHandle};
use state_machine::DmContext;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voice_dm=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let settings = Settings::from_env();
    let lexicon = Lexicon::from_settings(&settings)?;
    if let Some(path) = &settings.lexicon_path {
        tracing::info!(path = %path.display(), "Loaded lexicon overlay");
    }

    let policy = Policy::for_task(settings.task)?;
    tracing::info!(
        task = %settings.task,
        max_retries = ?settings.max_retries,
        thinking_ms = settings.thinking_time.as_millis(),
        "Dialogue policy ready"
    );

    let session_id = uuid::Uuid::new_v4().to_string();
    let context = DmContext::new(session_id, Arc::new(policy), Arc::new(lexicon))
        .with_thinking_time(settings.thinking_time)
        .with_max_retries(settings.max_retries)
        .with_no_input_timeout(settings.no_input_timeout);

    let session = SessionHandle::spawn(context, AdapterSettings::from_settings(&settings));
    let state = AppState::new(session);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    tracing::info!("Voice DM server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
