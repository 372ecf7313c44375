//! Events that drive the dialogue

use crate::policy::NodeId;
use serde::{Deserialize, Serialize};

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // Adapter events
    AdapterReady,
    SpeakComplete,
    Recognised {
        /// Ranked alternatives, best first
        hypotheses: Vec<Hypothesis>,
        nlu: Option<NluResult>,
    },
    NoInput,
    ListenComplete,

    // UI events
    Start,

    // Internal
    TimerElapsed {
        node: NodeId,
    },
}

impl Event {
    /// Convenience for a single-hypothesis recognition without NLU
    pub fn heard(utterance: impl Into<String>) -> Self {
        Event::Recognised {
            hypotheses: vec![Hypothesis::new(utterance)],
            nlu: None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::AdapterReady => "adapter_ready",
            Event::SpeakComplete => "speak_complete",
            Event::Recognised { .. } => "recognised",
            Event::NoInput => "no_input",
            Event::ListenComplete => "listen_complete",
            Event::Start => "start",
            Event::TimerElapsed { .. } => "timer_elapsed",
        }
    }
}

/// One recognition alternative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub utterance: String,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl Hypothesis {
    pub fn new(utterance: impl Into<String>) -> Self {
        Self {
            utterance: utterance.into(),
            confidence: None,
        }
    }
}

/// Structured intent/entity payload from an NLU service
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NluResult {
    #[serde(default)]
    pub top_intent: Option<String>,
    #[serde(default)]
    pub entities: Vec<Entity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub category: String,
    pub text: String,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl NluResult {
    /// Highest-confidence entity of `category` (first wins on ties)
    pub fn entity(&self, category: &str) -> Option<&Entity> {
        self.entities
            .iter()
            .filter(|e| e.category.eq_ignore_ascii_case(category))
            .fold(None, |best: Option<&Entity>, e| match best {
                Some(b) if b.confidence.unwrap_or(0.0) >= e.confidence.unwrap_or(0.0) => Some(b),
                _ => Some(e),
            })
    }
}
