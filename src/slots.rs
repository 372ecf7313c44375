//! Per-session slot store
//!
//! Each slot keeps the last recognition heard for it and, once a turn has
//! validated that recognition, the normalized value. `None` means "not yet
//! collected".

use crate::state_machine::event::{Hypothesis, NluResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotName {
    // Appointment
    Person,
    Date,
    WholeDay,
    Time,
    Confirmation,
    // Guessing game
    FirstTime,
    Color,
    Shape,
    Size,
    Specialty,
    GuessConfirmation,
    PlayAgain,
}

impl SlotName {
    pub const ALL: [SlotName; 12] = [
        SlotName::Person,
        SlotName::Date,
        SlotName::WholeDay,
        SlotName::Time,
        SlotName::Confirmation,
        SlotName::FirstTime,
        SlotName::Color,
        SlotName::Shape,
        SlotName::Size,
        SlotName::Specialty,
        SlotName::GuessConfirmation,
        SlotName::PlayAgain,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SlotName::Person => "person",
            SlotName::Date => "date",
            SlotName::WholeDay => "whole_day",
            SlotName::Time => "time",
            SlotName::Confirmation => "confirmation",
            SlotName::FirstTime => "first_time",
            SlotName::Color => "color",
            SlotName::Shape => "shape",
            SlotName::Size => "size",
            SlotName::Specialty => "specialty",
            SlotName::GuessConfirmation => "guess_confirmation",
            SlotName::PlayAgain => "play_again",
        }
    }
}

impl fmt::Display for SlotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SlotName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| format!("unknown slot: {s}"))
    }
}

/// The best recognition for a slot, with any NLU payload that came with it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recognition {
    pub utterance: String,
    pub confidence: Option<f64>,
    pub nlu: Option<NluResult>,
}

impl Recognition {
    /// Top hypothesis of a recognition result; `None` if the list is empty
    pub fn from_hypotheses(hypotheses: &[Hypothesis], nlu: Option<NluResult>) -> Option<Self> {
        hypotheses.first().map(|top| Self {
            utterance: top.utterance.clone(),
            confidence: top.confidence,
            nlu,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Slot {
    pub heard: Option<Recognition>,
    pub value: Option<String>,
}

/// Mutations the dialogue applies to the store
#[derive(Debug, Clone, PartialEq)]
pub enum SlotOp {
    /// RECOGNISED: overwrite what was heard
    Heard {
        slot: SlotName,
        recognition: Recognition,
    },
    /// NOINPUT: forget what was heard
    Clear { slot: SlotName },
    /// Evaluation accepted the heard value
    Accept { slot: SlotName, value: String },
    /// Null out the listed slots (new round)
    Reset { slots: Vec<SlotName> },
    /// Null out everything (restart)
    ResetAll,
    /// Which specialty question this round asks
    PickQuestion { index: usize },
    /// Name of the profile the game settled on
    SetGuess { guess: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotStore {
    slots: BTreeMap<SlotName, Slot>,
    question: Option<usize>,
    guess: Option<String>,
}

impl Default for SlotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotStore {
    pub fn new() -> Self {
        Self {
            slots: SlotName::ALL
                .into_iter()
                .map(|name| (name, Slot::default()))
                .collect(),
            question: None,
            guess: None,
        }
    }

    pub fn heard(&self, slot: SlotName) -> Option<&Recognition> {
        self.slots.get(&slot).and_then(|s| s.heard.as_ref())
    }

    pub fn value(&self, slot: SlotName) -> Option<&str> {
        self.slots.get(&slot).and_then(|s| s.value.as_deref())
    }

    /// Accepted value, or the raw utterance when nothing was accepted yet
    pub fn display(&self, slot: SlotName) -> Option<&str> {
        self.value(slot)
            .or_else(|| self.heard(slot).map(|r| r.utterance.as_str()))
    }

    pub fn question(&self) -> Option<usize> {
        self.question
    }

    pub fn guess(&self) -> Option<&str> {
        self.guess.as_deref()
    }

    /// Accepted values only
    pub fn values(&self) -> BTreeMap<SlotName, String> {
        self.slots
            .iter()
            .filter_map(|(name, slot)| slot.value.clone().map(|v| (*name, v)))
            .collect()
    }

    /// Raw utterances currently held
    pub fn heard_utterances(&self) -> BTreeMap<SlotName, String> {
        self.slots
            .iter()
            .filter_map(|(name, slot)| slot.heard.as_ref().map(|r| (*name, r.utterance.clone())))
            .collect()
    }

    pub fn apply(&mut self, op: SlotOp) {
        match op {
            SlotOp::Heard { slot, recognition } => {
                self.slots.entry(slot).or_default().heard = Some(recognition);
            }
            SlotOp::Clear { slot } => {
                let entry = self.slots.entry(slot).or_default();
                entry.heard = None;
                entry.value = None;
            }
            SlotOp::Accept { slot, value } => {
                self.slots.entry(slot).or_default().value = Some(value);
            }
            SlotOp::Reset { slots } => {
                for slot in slots {
                    self.slots.insert(slot, Slot::default());
                }
            }
            SlotOp::ResetAll => *self = Self::new(),
            SlotOp::PickQuestion { index } => self.question = Some(index),
            SlotOp::SetGuess { guess } => self.guess = guess,
        }
    }

    pub fn apply_all(&mut self, ops: impl IntoIterator<Item = SlotOp>) {
        for op in ops {
            self.apply(op);
        }
    }
}
