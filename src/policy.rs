//! Dialogue policy graph
//!
//! A task is a directed graph of nodes. Question nodes are the composite
//! prompt, ask, no-input and invalid-input turns; their transition lists are
//! evaluated top to bottom and the first matching guard wins. The graph is
//! plain data, so both tasks run on the same engine in `state_machine`.

mod appointment;
mod guessing;

use crate::config::Lexicon;
use crate::slots::{SlotName, SlotStore};
use crate::validators::Category;
use rand::Rng;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    #[default]
    Appointment,
    Guessing,
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "appointment" => Ok(TaskKind::Appointment),
            "guessing" | "game" => Ok(TaskKind::Guessing),
            other => Err(format!("unknown task: {other}")),
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Appointment => f.write_str("appointment"),
            TaskKind::Guessing => f.write_str("guessing"),
        }
    }
}

/// Identifier of a node in a policy graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(pub &'static str);

impl NodeId {
    pub fn as_str(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

// ============================================================================
// Prompts
// ============================================================================

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").expect("valid regex"));

/// Spoken text, optionally templated with `{slot}`, `{question}` or `{guess}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Fill placeholders from the slot store; unknown keys are left verbatim
    pub fn render(&self, slots: &SlotStore, lexicon: &Lexicon) -> String {
        PLACEHOLDER
            .replace_all(&self.0, |caps: &Captures| {
                let key = &caps[1];
                let value = match key {
                    "question" => slots
                        .question()
                        .and_then(|i| lexicon.specialty_questions.get(i))
                        .map(|q| q.text.as_str()),
                    "guess" => slots.guess(),
                    _ => match key.parse::<SlotName>() {
                        Ok(slot) => slots.display(slot),
                        Err(_) => return caps[0].to_string(),
                    },
                };
                value.unwrap_or_default().to_string()
            })
            .into_owned()
    }
}

// ============================================================================
// Guards and transitions
// ============================================================================

/// What an accepting guard requires of the classified value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expect {
    /// Any valid value
    Any,
    /// A valid value equal to this one ("yes", "no")
    Value(&'static str),
}

impl Expect {
    fn matches(&self, value: Option<&str>) -> bool {
        match self {
            Expect::Any => value.is_some(),
            Expect::Value(expected) => value == Some(*expected),
        }
    }
}

/// Predicate over the turn's slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// Slot heard and its classification is valid and matches
    Accepts(Expect),
    /// Slot heard but no earlier guard accepted it
    Invalid,
    /// Unguarded fallback, catches "nothing heard"
    Always,
}

impl Guard {
    /// `classified` is the normalized value when the slot holds a valid one
    pub fn fires(&self, heard: bool, classified: Option<&str>) -> bool {
        match self {
            Guard::Accepts(expect) => heard && expect.matches(classified),
            Guard::Invalid => heard,
            Guard::Always => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Node(NodeId),
    InvalidInput,
    NoInput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub guard: Guard,
    pub target: Target,
}

// ============================================================================
// Nodes
// ============================================================================

/// A composite question turn
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub slot: SlotName,
    pub category: Category,
    /// NLU entity category to read instead of the raw utterance
    pub entity: Option<&'static str>,
    /// Ask the recognizer for NLU results
    pub nlu: bool,
    pub prompt: Prompt,
    pub invalid_prompt: Prompt,
    pub no_input_prompt: Prompt,
    pub transitions: Vec<Transition>,
}

impl Question {
    pub fn new(slot: SlotName, category: Category, prompt: &str) -> Self {
        Self {
            slot,
            category,
            entity: None,
            nlu: false,
            prompt: Prompt::new(prompt),
            invalid_prompt: Prompt::new(format!("I can't understand. {prompt}")),
            no_input_prompt: Prompt::new(format!("I can't hear you! {prompt}")),
            transitions: Vec::new(),
        }
    }

    pub fn entity(mut self, category: &'static str) -> Self {
        self.entity = Some(category);
        self.nlu = true;
        self
    }

    pub fn nlu(mut self) -> Self {
        self.nlu = true;
        self
    }

    pub fn on_invalid(mut self, prompt: &str) -> Self {
        self.invalid_prompt = Prompt::new(prompt);
        self
    }

    pub fn on_no_input(mut self, prompt: &str) -> Self {
        self.no_input_prompt = Prompt::new(prompt);
        self
    }

    pub fn route(mut self, expect: Expect, node: NodeId) -> Self {
        self.transitions.push(Transition {
            guard: Guard::Accepts(expect),
            target: Target::Node(node),
        });
        self
    }

    /// Append the invalid-input and no-input branches, in that order
    pub fn with_fallbacks(mut self) -> Self {
        self.transitions.push(Transition {
            guard: Guard::Invalid,
            target: Target::InvalidInput,
        });
        self.transitions.push(Transition {
            guard: Guard::Always,
            target: Target::NoInput,
        });
        self
    }
}

/// Where a spoken node leads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Node(NodeId),
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Question(Question),
    /// Speak, then move on once speaking completes
    Say { prompt: Prompt, next: Next },
    /// Wait out the configured thinking time
    Pause { next: NodeId },
    /// Run the best-match selector and branch immediately
    Guess { found: NodeId, not_found: NodeId },
}

/// Side effects performed when a node is entered
#[derive(Debug, Clone, PartialEq)]
pub enum EnterAction {
    ResetSlots(Vec<SlotName>),
    PickQuestion,
    Report(OutcomeKind),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub on_enter: Vec<EnterAction>,
}

impl Node {
    pub fn question(id: NodeId, question: Question) -> Self {
        Self {
            id,
            kind: NodeKind::Question(question),
            on_enter: Vec::new(),
        }
    }

    pub fn say(id: NodeId, prompt: &str, next: Next) -> Self {
        Self {
            id,
            kind: NodeKind::Say {
                prompt: Prompt::new(prompt),
                next,
            },
            on_enter: Vec::new(),
        }
    }

    pub fn pause(id: NodeId, next: NodeId) -> Self {
        Self {
            id,
            kind: NodeKind::Pause { next },
            on_enter: Vec::new(),
        }
    }

    pub fn guess(id: NodeId, found: NodeId, not_found: NodeId) -> Self {
        Self {
            id,
            kind: NodeKind::Guess { found, not_found },
            on_enter: Vec::new(),
        }
    }

    pub fn on_enter(mut self, action: EnterAction) -> Self {
        self.on_enter.push(action);
        self
    }

    fn targets(&self) -> Vec<NodeId> {
        match &self.kind {
            NodeKind::Question(q) => q
                .transitions
                .iter()
                .filter_map(|t| match t.target {
                    Target::Node(id) => Some(id),
                    Target::InvalidInput | Target::NoInput => None,
                })
                .collect(),
            NodeKind::Say { next, .. } => match next {
                Next::Node(id) => vec![*id],
                Next::Done => vec![],
            },
            NodeKind::Pause { next } => vec![*next],
            NodeKind::Guess { found, not_found } => vec![*found, *not_found],
        }
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// Which task result a node reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Booked,
    Won,
    Lost,
    GaveUp,
    Goodbye,
    Abandoned,
}

/// Structured task result published to the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Booked {
        person: String,
        date: String,
        /// `None` for whole-day appointments
        time: Option<String>,
    },
    Won {
        fungus: String,
        /// What the player can learn about it
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Lost {
        guess: Option<String>,
    },
    GaveUp,
    Goodbye,
    Abandoned,
}

impl OutcomeKind {
    pub fn outcome(self, slots: &SlotStore, lexicon: &Lexicon) -> Outcome {
        let owned = |slot| slots.display(slot).unwrap_or_default().to_string();
        match self {
            OutcomeKind::Booked => Outcome::Booked {
                person: owned(SlotName::Person),
                date: owned(SlotName::Date),
                time: if slots.value(SlotName::WholeDay) == Some("yes") {
                    None
                } else {
                    slots.value(SlotName::Time).map(str::to_string)
                },
            },
            OutcomeKind::Won => {
                let fungus = slots.guess().unwrap_or_default();
                Outcome::Won {
                    fungus: fungus.to_string(),
                    description: lexicon
                        .profile(fungus)
                        .map(|p| p.description.clone())
                        .filter(|d| !d.is_empty()),
                }
            }
            OutcomeKind::Lost => Outcome::Lost {
                guess: slots.guess().map(str::to_string),
            },
            OutcomeKind::GaveUp => Outcome::GaveUp,
            OutcomeKind::Goodbye => Outcome::Goodbye,
            OutcomeKind::Abandoned => Outcome::Abandoned,
        }
    }
}

// ============================================================================
// Random question selection
// ============================================================================

/// Chooses which specialty question a round asks
pub trait QuestionPicker: Send + Sync + fmt::Debug {
    /// Index in `0..count`; `count` is never zero
    fn pick(&self, count: usize) -> usize;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomPicker;

impl QuestionPicker for RandomPicker {
    fn pick(&self, count: usize) -> usize {
        rand::thread_rng().gen_range(0..count.max(1))
    }
}

/// Always the same question
#[derive(Debug, Clone, Copy)]
pub struct FixedPicker(pub usize);

impl QuestionPicker for FixedPicker {
    fn pick(&self, count: usize) -> usize {
        self.0 % count.max(1)
    }
}

// ============================================================================
// Policy
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("duplicate node {0}")]
    DuplicateNode(NodeId),
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    #[error("node {from} targets unknown node {to}")]
    UnknownTarget { from: NodeId, to: NodeId },
    #[error("question {0} has no unguarded fallback")]
    MissingFallback(NodeId),
    #[error("question {0} has a transition after its unguarded fallback")]
    FallbackNotLast(NodeId),
    #[error("question {0} routes NoInput from a guarded branch")]
    GuardedNoInput(NodeId),
    #[error("guess node {0} branches into another guess node")]
    ChainedGuess(NodeId),
}

/// A validated task graph
#[derive(Debug, Clone)]
pub struct Policy {
    task: TaskKind,
    entry: NodeId,
    abandon: NodeId,
    nodes: HashMap<NodeId, Node>,
}

impl Policy {
    pub fn new(
        task: TaskKind,
        entry: NodeId,
        abandon: NodeId,
        nodes: Vec<Node>,
    ) -> Result<Self, PolicyError> {
        let mut map = HashMap::with_capacity(nodes.len());
        for node in nodes {
            let id = node.id;
            if map.insert(id, node).is_some() {
                return Err(PolicyError::DuplicateNode(id));
            }
        }

        let policy = Self {
            task,
            entry,
            abandon,
            nodes: map,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn for_task(task: TaskKind) -> Result<Self, PolicyError> {
        match task {
            TaskKind::Appointment => appointment::policy(),
            TaskKind::Guessing => guessing::policy(),
        }
    }

    pub fn task(&self) -> TaskKind {
        self.task
    }

    pub fn entry(&self) -> NodeId {
        self.entry
    }

    /// Where a turn goes once a configured retry cap is exceeded
    pub fn abandon(&self) -> NodeId {
        self.abandon
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn question(&self, id: NodeId) -> Option<&Question> {
        match &self.nodes.get(&id)?.kind {
            NodeKind::Question(q) => Some(q),
            _ => None,
        }
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    fn validate(&self) -> Result<(), PolicyError> {
        for id in [self.entry, self.abandon] {
            if !self.nodes.contains_key(&id) {
                return Err(PolicyError::UnknownNode(id));
            }
        }

        for node in self.nodes.values() {
            for to in node.targets() {
                if !self.nodes.contains_key(&to) {
                    return Err(PolicyError::UnknownTarget { from: node.id, to });
                }
            }

            match &node.kind {
                NodeKind::Question(q) => Self::validate_transitions(node.id, &q.transitions)?,
                NodeKind::Guess { found, not_found } => {
                    for to in [found, not_found] {
                        if matches!(
                            self.nodes.get(to).map(|n| &n.kind),
                            Some(NodeKind::Guess { .. })
                        ) {
                            return Err(PolicyError::ChainedGuess(node.id));
                        }
                    }
                }
                NodeKind::Say { .. } | NodeKind::Pause { .. } => {}
            }
        }
        Ok(())
    }

    fn validate_transitions(id: NodeId, transitions: &[Transition]) -> Result<(), PolicyError> {
        let Some(last) = transitions.last() else {
            return Err(PolicyError::MissingFallback(id));
        };
        if last.guard != Guard::Always {
            return Err(if transitions.iter().any(|t| t.guard == Guard::Always) {
                PolicyError::FallbackNotLast(id)
            } else {
                PolicyError::MissingFallback(id)
            });
        }
        if transitions
            .iter()
            .any(|t| t.target == Target::NoInput && t.guard != Guard::Always)
        {
            return Err(PolicyError::GuardedNoInput(id));
        }
        Ok(())
    }
}
