//! Effects produced by state transitions

use crate::policy::{NodeId, Outcome};
use std::time::Duration;

/// How the adapter should listen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenOptions {
    /// Request NLU results along with the transcript
    pub nlu: bool,
    /// Silence after which the adapter reports NOINPUT
    pub no_input_timeout: Duration,
}

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Initialize speech recognition and synthesis
    Prepare,

    /// Synthesize an utterance
    Speak { utterance: String },

    /// Open the microphone for one recognition
    Listen { options: ListenOptions },

    /// Post `TimerElapsed { node }` after `delay`
    StartTimer { node: NodeId, delay: Duration },

    /// Notify connected clients of the new state
    PublishState,

    /// Report a task result
    Complete { outcome: Outcome },
}

impl Effect {
    pub fn speak(utterance: impl Into<String>) -> Self {
        Effect::Speak {
            utterance: utterance.into(),
        }
    }
}
