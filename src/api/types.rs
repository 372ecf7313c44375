//! API request and response types

use crate::state_machine::event::{Hypothesis, NluResult};
use crate::state_machine::Event;
use serde::{Deserialize, Serialize};

/// Event reported by the browser-side speech adapter
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdapterEventRequest {
    /// Recognizer and synthesizer initialized
    Ready,
    SpeakComplete,
    Recognised {
        #[serde(default)]
        hypotheses: Vec<Hypothesis>,
        #[serde(default)]
        nlu: Option<NluResult>,
    },
    NoInput,
    ListenComplete,
}

impl From<AdapterEventRequest> for Event {
    fn from(req: AdapterEventRequest) -> Self {
        match req {
            AdapterEventRequest::Ready => Event::AdapterReady,
            AdapterEventRequest::SpeakComplete => Event::SpeakComplete,
            AdapterEventRequest::Recognised { hypotheses, nlu } => {
                Event::Recognised { hypotheses, nlu }
            }
            AdapterEventRequest::NoInput => Event::NoInput,
            AdapterEventRequest::ListenComplete => Event::ListenComplete,
        }
    }
}

/// Response for actions handed to the runtime
#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub queued: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
