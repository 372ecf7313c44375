//! Dialogue state types

use crate::config::{Lexicon, DEFAULT_NO_INPUT_TIMEOUT, DEFAULT_THINKING_TIME};
use crate::policy::{NodeId, Policy, QuestionPicker, RandomPicker};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Phase within a question turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    /// Speaking the question
    Prompt,
    /// Listening for the answer
    Ask,
    /// Speaking the "didn't understand" prompt
    InvalidInput,
    /// Speaking the "didn't hear" prompt
    NoInput,
}

/// Dialogue state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DmState {
    /// Waiting for the speech adapter to initialize
    #[default]
    Prepare,

    /// Adapter ready, waiting for the user to press start
    WaitToStart,

    /// Inside a question node
    Turn {
        node: NodeId,
        phase: TurnPhase,
        /// Failed attempts at this node so far
        retries: u32,
    },

    /// Speaking a statement node
    Speaking { node: NodeId },

    /// Giving the player time to think
    Thinking { node: NodeId },

    /// Task finished; start again to restart
    Done,
}

impl DmState {
    /// A conversation is in progress
    pub fn is_active(&self) -> bool {
        !matches!(self, DmState::Prepare | DmState::WaitToStart | DmState::Done)
    }

    pub fn node(&self) -> Option<NodeId> {
        match self {
            DmState::Turn { node, .. } | DmState::Speaking { node } | DmState::Thinking { node } => {
                Some(*node)
            }
            DmState::Prepare | DmState::WaitToStart | DmState::Done => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DmState::Prepare => "prepare",
            DmState::WaitToStart => "wait_to_start",
            DmState::Turn { .. } => "turn",
            DmState::Speaking { .. } => "speaking",
            DmState::Thinking { .. } => "thinking",
            DmState::Done => "done",
        }
    }
}

/// Context for a dialogue session (immutable configuration)
#[derive(Debug, Clone)]
pub struct DmContext {
    pub session_id: String,
    pub policy: Arc<Policy>,
    pub lexicon: Arc<Lexicon>,
    pub picker: Arc<dyn QuestionPicker>,
    /// Anchors dates spoken without a year
    pub today: NaiveDate,
    pub thinking_time: Duration,
    /// `None` re-prompts forever
    pub max_retries: Option<u32>,
    pub no_input_timeout: Duration,
}

impl DmContext {
    pub fn new(session_id: impl Into<String>, policy: Arc<Policy>, lexicon: Arc<Lexicon>) -> Self {
        Self {
            session_id: session_id.into(),
            policy,
            lexicon,
            picker: Arc::new(RandomPicker),
            today: chrono::Local::now().date_naive(),
            thinking_time: DEFAULT_THINKING_TIME,
            max_retries: None,
            no_input_timeout: DEFAULT_NO_INPUT_TIMEOUT,
        }
    }

    pub fn with_picker(mut self, picker: Arc<dyn QuestionPicker>) -> Self {
        self.picker = picker;
        self
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn with_thinking_time(mut self, thinking_time: Duration) -> Self {
        self.thinking_time = thinking_time;
        self
    }

    pub fn with_max_retries(mut self, max_retries: Option<u32>) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_no_input_timeout(mut self, timeout: Duration) -> Self {
        self.no_input_timeout = timeout;
        self
    }
}
