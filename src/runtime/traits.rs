//! Trait abstractions for runtime I/O
//!
//! The speech adapter is the only I/O the dialogue needs. Calls return as
//! soon as the request is issued; completion comes back as an `Event`.

use super::SessionEvent;
use crate::config::Settings;
use crate::state_machine::ListenOptions;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

/// Locale and voice for recognition and synthesis
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdapterSettings {
    pub locale: String,
    pub voice: String,
}

impl AdapterSettings {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            locale: settings.locale.clone(),
            voice: settings.voice.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Speech adapter unavailable: {0}")]
    Unavailable(String),
}

/// Speech recognition and synthesis
#[async_trait]
pub trait SpeechAdapter: Send + Sync {
    /// Initialize; reports `AdapterReady` when done
    async fn prepare(&self, settings: &AdapterSettings) -> Result<(), AdapterError>;

    /// Start speaking; reports `SpeakComplete` when done
    async fn speak(&self, utterance: &str) -> Result<(), AdapterError>;

    /// Start listening; reports `Recognised` or `NoInput`, then `ListenComplete`
    async fn listen(&self, options: &ListenOptions) -> Result<(), AdapterError>;
}

#[async_trait]
impl<T: SpeechAdapter + ?Sized> SpeechAdapter for Arc<T> {
    async fn prepare(&self, settings: &AdapterSettings) -> Result<(), AdapterError> {
        (**self).prepare(settings).await
    }

    async fn speak(&self, utterance: &str) -> Result<(), AdapterError> {
        (**self).speak(utterance).await
    }

    async fn listen(&self, options: &ListenOptions) -> Result<(), AdapterError> {
        (**self).listen(options).await
    }
}

// ============================================================================
// Production Adapter
// ============================================================================

/// Command for the speech adapter running in the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdapterCommand {
    Prepare { locale: String, voice: String },
    Speak { utterance: String },
    Listen { nlu: bool, no_input_timeout_ms: u64 },
}

/// Forwards commands to the browser over the session's SSE stream
///
/// The browser runs the actual recognizer and synthesizer and posts their
/// events back to `/api/adapter/events`.
#[derive(Clone)]
pub struct BrowserAdapter {
    broadcast_tx: broadcast::Sender<SessionEvent>,
}

impl BrowserAdapter {
    pub fn new(broadcast_tx: broadcast::Sender<SessionEvent>) -> Self {
        Self { broadcast_tx }
    }

    fn send(&self, command: AdapterCommand) {
        // No subscriber means no browser yet; it catches up from the init event
        if self
            .broadcast_tx
            .send(SessionEvent::Command { command })
            .is_err()
        {
            tracing::debug!("No client connected for adapter command");
        }
    }
}

#[async_trait]
impl SpeechAdapter for BrowserAdapter {
    async fn prepare(&self, settings: &AdapterSettings) -> Result<(), AdapterError> {
        self.send(AdapterCommand::Prepare {
            locale: settings.locale.clone(),
            voice: settings.voice.clone(),
        });
        Ok(())
    }

    async fn speak(&self, utterance: &str) -> Result<(), AdapterError> {
        self.send(AdapterCommand::Speak {
            utterance: utterance.to_string(),
        });
        Ok(())
    }

    async fn listen(&self, options: &ListenOptions) -> Result<(), AdapterError> {
        let no_input_timeout_ms = u64::try_from(options.no_input_timeout.as_millis())
            .map_err(|_| AdapterError::Unavailable("no-input timeout out of range".to_string()))?;
        self.send(AdapterCommand::Listen {
            nlu: options.nlu,
            no_input_timeout_ms,
        });
        Ok(())
    }
}
