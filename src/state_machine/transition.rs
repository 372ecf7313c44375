//! Pure state transition function
//!
//! Given the current state, the slot store and an event, compute the next
//! state, the slot mutations, and the effects for the runtime to perform.
//! Nothing here does I/O.

use super::{DmContext, DmState, Effect, Event, ListenOptions, TurnPhase};
use crate::matcher::{self, Attributes, SpecialtyAnswer};
use crate::policy::{EnterAction, Next, NodeId, NodeKind, Prompt, Question, Target};
use crate::slots::{Recognition, SlotName, SlotOp, SlotStore};
use crate::validators;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: DmState,
    /// Applied to the slot store before effects run
    pub slot_ops: Vec<SlotOp>,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: DmState) -> Self {
        Self {
            new_state: state,
            slot_ops: vec![],
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }

    pub fn with_slot_op(mut self, op: SlotOp) -> Self {
        self.slot_ops.push(op);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Speech adapter is not ready yet")]
    NotReady,
    #[error("Policy has no node {0}")]
    UnknownNode(NodeId),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Effects issued once when a session is created
pub fn initial_effects() -> Vec<Effect> {
    vec![Effect::Prepare, Effect::PublishState]
}

/// Pure transition function
pub fn transition(
    state: &DmState,
    slots: &SlotStore,
    ctx: &DmContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Startup
        // ============================================================
        (DmState::Prepare, Event::AdapterReady) => {
            Ok(TransitionResult::new(DmState::WaitToStart).with_effect(Effect::PublishState))
        }

        (DmState::Prepare, Event::Start) => Err(TransitionError::NotReady),

        // Start from any later state (re)starts the task from the entry node
        (_, Event::Start) => {
            let builder = Entry::new(slots).op(SlotOp::ResetAll);
            builder.enter(ctx.policy.entry(), ctx)
        }

        // ============================================================
        // Question turns
        // ============================================================

        // Prompt finished: open the microphone
        (
            DmState::Turn {
                node,
                phase: TurnPhase::Prompt | TurnPhase::InvalidInput | TurnPhase::NoInput,
                retries,
            },
            Event::SpeakComplete,
        ) => {
            let question = question(ctx, *node)?;
            Ok(TransitionResult::new(DmState::Turn {
                node: *node,
                phase: TurnPhase::Ask,
                retries: *retries,
            })
            .with_slot_op(SlotOp::Clear {
                slot: question.slot,
            })
            .with_effect(Effect::Listen {
                options: ListenOptions {
                    nlu: question.nlu,
                    no_input_timeout: ctx.no_input_timeout,
                },
            })
            .with_effect(Effect::PublishState))
        }

        (
            DmState::Turn {
                node,
                phase: TurnPhase::Ask,
                ..
            },
            Event::Recognised { hypotheses, nlu },
        ) => {
            let slot = question(ctx, *node)?.slot;
            let op = match Recognition::from_hypotheses(&hypotheses, nlu) {
                Some(recognition) => SlotOp::Heard { slot, recognition },
                None => SlotOp::Clear { slot },
            };
            Ok(TransitionResult::new(state.clone())
                .with_slot_op(op)
                .with_effect(Effect::PublishState))
        }

        (
            DmState::Turn {
                node,
                phase: TurnPhase::Ask,
                ..
            },
            Event::NoInput,
        ) => {
            let slot = question(ctx, *node)?.slot;
            Ok(TransitionResult::new(state.clone()).with_slot_op(SlotOp::Clear { slot }))
        }

        (
            DmState::Turn {
                node,
                phase: TurnPhase::Ask,
                retries,
            },
            Event::ListenComplete,
        ) => evaluate(*node, *retries, slots, ctx),

        // ============================================================
        // Statements and pauses
        // ============================================================
        (DmState::Speaking { node }, Event::SpeakComplete) => {
            let Some(NodeKind::Say { next, .. }) = ctx.policy.node(*node).map(|n| &n.kind) else {
                return Err(TransitionError::UnknownNode(*node));
            };
            match next {
                Next::Node(next) => Entry::new(slots).enter(*next, ctx),
                Next::Done => {
                    Ok(TransitionResult::new(DmState::Done).with_effect(Effect::PublishState))
                }
            }
        }

        (DmState::Thinking { node }, Event::TimerElapsed { node: elapsed }) if *node == elapsed => {
            let Some(NodeKind::Pause { next }) = ctx.policy.node(*node).map(|n| &n.kind) else {
                return Err(TransitionError::UnknownNode(*node));
            };
            Entry::new(slots).enter(*next, ctx)
        }

        // ============================================================
        // Everything else is ignored by the runtime
        // ============================================================
        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{} not handled in {}",
            event.name(),
            state.name()
        ))),
    }
}

fn question(ctx: &DmContext, node: NodeId) -> Result<&Question, TransitionError> {
    ctx.policy
        .question(node)
        .ok_or(TransitionError::UnknownNode(node))
}

/// `ListenComplete`: walk the node's transitions, first matching guard wins
fn evaluate(
    node: NodeId,
    retries: u32,
    slots: &SlotStore,
    ctx: &DmContext,
) -> Result<TransitionResult, TransitionError> {
    let question = question(ctx, node)?;
    let heard = slots.heard(question.slot);
    let value = heard.and_then(|r| {
        validators::classify_input(
            question.category,
            question.entity,
            &r.utterance,
            r.nlu.as_ref(),
            &ctx.lexicon,
            ctx.today,
        )
        .value
    });

    let target = question
        .transitions
        .iter()
        .find(|t| t.guard.fires(heard.is_some(), value.as_deref()))
        .map(|t| t.target)
        .ok_or_else(|| TransitionError::InvalidTransition(format!("no transition fired at {node}")))?;

    match target {
        Target::Node(next) => {
            let mut entry = Entry::new(slots);
            if let Some(value) = value {
                entry = entry.op(SlotOp::Accept {
                    slot: question.slot,
                    value,
                });
            }
            entry.enter(next, ctx)
        }
        Target::InvalidInput => reprompt(
            node,
            TurnPhase::InvalidInput,
            &question.invalid_prompt,
            retries,
            slots,
            ctx,
        ),
        Target::NoInput => reprompt(
            node,
            TurnPhase::NoInput,
            &question.no_input_prompt,
            retries,
            slots,
            ctx,
        ),
    }
}

fn reprompt(
    node: NodeId,
    phase: TurnPhase,
    prompt: &Prompt,
    retries: u32,
    slots: &SlotStore,
    ctx: &DmContext,
) -> Result<TransitionResult, TransitionError> {
    let retries = retries.saturating_add(1);
    if ctx.max_retries.is_some_and(|max| retries > max) {
        tracing::info!(node = %node, retries, "Retry limit reached, abandoning");
        return Entry::new(slots).enter(ctx.policy.abandon(), ctx);
    }

    Ok(TransitionResult::new(DmState::Turn {
        node,
        phase,
        retries,
    })
    .with_effect(Effect::speak(prompt.render(slots, &ctx.lexicon)))
    .with_effect(Effect::PublishState))
}

/// Accumulates slot ops and effects while entering a node
///
/// Prompts render against a scratch copy of the store with the pending ops
/// applied, so a node sees the values accepted on the way in.
struct Entry {
    scratch: SlotStore,
    ops: Vec<SlotOp>,
    effects: Vec<Effect>,
}

impl Entry {
    fn new(slots: &SlotStore) -> Self {
        Self {
            scratch: slots.clone(),
            ops: vec![],
            effects: vec![],
        }
    }

    fn op(mut self, op: SlotOp) -> Self {
        self.scratch.apply(op.clone());
        self.ops.push(op);
        self
    }

    fn finish(self, state: DmState, effect: Effect) -> TransitionResult {
        let mut result = TransitionResult::new(state)
            .with_effects(self.effects)
            .with_effect(effect)
            .with_effect(Effect::PublishState);
        result.slot_ops = self.ops;
        result
    }

    fn enter(mut self, id: NodeId, ctx: &DmContext) -> Result<TransitionResult, TransitionError> {
        let node = ctx
            .policy
            .node(id)
            .ok_or(TransitionError::UnknownNode(id))?;

        for action in &node.on_enter {
            match action {
                EnterAction::ResetSlots(list) => {
                    self = self.op(SlotOp::Reset {
                        slots: list.clone(),
                    });
                }
                EnterAction::PickQuestion => {
                    let count = ctx.lexicon.specialty_questions.len();
                    if count > 0 {
                        let index = ctx.picker.pick(count);
                        self = self.op(SlotOp::PickQuestion { index });
                    }
                }
                EnterAction::Report(kind) => {
                    let outcome = kind.outcome(&self.scratch, &ctx.lexicon);
                    self.effects.push(Effect::Complete { outcome });
                }
            }
        }

        match &node.kind {
            NodeKind::Question(q) => {
                let utterance = q.prompt.render(&self.scratch, &ctx.lexicon);
                let state = DmState::Turn {
                    node: id,
                    phase: TurnPhase::Prompt,
                    retries: 0,
                };
                Ok(self.finish(state, Effect::speak(utterance)))
            }
            NodeKind::Say { prompt, .. } => {
                let utterance = prompt.render(&self.scratch, &ctx.lexicon);
                Ok(self.finish(DmState::Speaking { node: id }, Effect::speak(utterance)))
            }
            NodeKind::Pause { .. } => Ok(self.finish(
                DmState::Thinking { node: id },
                Effect::StartTimer {
                    node: id,
                    delay: ctx.thinking_time,
                },
            )),
            NodeKind::Guess { found, not_found } => {
                let attributes = attributes(&self.scratch, ctx);
                let best = matcher::best_match(&attributes, &ctx.lexicon.profiles);
                tracing::debug!(
                    ?attributes,
                    guess = best.map(|m| m.profile.name.as_str()),
                    score = best.map(|m| m.score),
                    "Best match"
                );
                let next = if best.is_some() { *found } else { *not_found };
                let guess = best.map(|m| m.profile.name.clone());
                self.op(SlotOp::SetGuess { guess }).enter(next, ctx)
            }
        }
    }
}

/// Gather the round's answers for the best-match selector
fn attributes(slots: &SlotStore, ctx: &DmContext) -> Attributes {
    let specialty = slots
        .question()
        .and_then(|i| ctx.lexicon.specialty_questions.get(i))
        .zip(slots.value(SlotName::Specialty))
        .map(|(q, answer)| SpecialtyAnswer {
            specialty: q.specialty.clone(),
            present: answer == "yes",
        });

    Attributes {
        color: slots.value(SlotName::Color).map(str::to_string),
        shape: slots.value(SlotName::Shape).map(str::to_string),
        tall: slots.value(SlotName::Size).map(|v| v == "yes"),
        specialty,
    }
}
