//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across arbitrary event sequences.

use super::transition::*;
use super::*;
use crate::config::Lexicon;
use crate::policy::{FixedPicker, NodeId, NodeKind, Policy, TaskKind};
use crate::slots::{SlotOp, SlotStore};
use crate::state_machine::event::{Entity, Hypothesis, NluResult};
use chrono::NaiveDate;
use proptest::prelude::*;
use std::sync::Arc;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context(task: TaskKind, max_retries: Option<u32>, pick: usize) -> DmContext {
    DmContext::new(
        "prop-session",
        Arc::new(Policy::for_task(task).unwrap()),
        Arc::new(Lexicon::default()),
    )
    .with_picker(Arc::new(FixedPicker(pick)))
    .with_today(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap())
    .with_max_retries(max_retries)
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_task() -> impl Strategy<Value = TaskKind> {
    prop_oneof![Just(TaskKind::Appointment), Just(TaskKind::Guessing)]
}

/// Words some validator accepts, mixed with noise
fn arb_utterance() -> impl Strategy<Value = String> {
    let known: Vec<String> = [
        "yes", "no", "john", "monday", "march 3", "14:30", "red", "white", "bell", "funnel",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect();
    prop_oneof![
        3 => proptest::sample::select(known),
        1 => "[a-z ]{0,12}",
    ]
}

fn arb_recognised() -> impl Strategy<Value = Event> {
    (
        proptest::collection::vec(arb_utterance(), 0..3),
        proptest::option::of(("[a-z]{3,6}", arb_utterance())),
    )
        .prop_map(|(utterances, entity)| Event::Recognised {
            hypotheses: utterances.into_iter().map(Hypothesis::new).collect(),
            nlu: entity.map(|(category, text)| NluResult {
                top_intent: None,
                entities: vec![Entity {
                    category,
                    text,
                    confidence: Some(0.9),
                }],
            }),
        })
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        1 => Just(Event::AdapterReady),
        1 => Just(Event::Start),
        3 => Just(Event::SpeakComplete),
        3 => arb_recognised(),
        1 => Just(Event::NoInput),
        3 => Just(Event::ListenComplete),
        1 => Just(Event::TimerElapsed {
            node: NodeId("thinking")
        }),
    ]
}

// ============================================================================
// State Validity Checkers
// ============================================================================

fn state_matches_policy(state: &DmState, ctx: &DmContext) -> bool {
    let kind = |node: NodeId| ctx.policy.node(node).map(|n| &n.kind);
    match state {
        DmState::Turn { node, .. } => matches!(kind(*node), Some(NodeKind::Question(_))),
        DmState::Speaking { node } => matches!(kind(*node), Some(NodeKind::Say { .. })),
        DmState::Thinking { node } => matches!(kind(*node), Some(NodeKind::Pause { .. })),
        DmState::Prepare | DmState::WaitToStart | DmState::Done => true,
    }
}

fn effects_are_valid(effects: &[Effect], new_state: &DmState) -> bool {
    for effect in effects {
        let ok = match effect {
            Effect::Listen { .. } => matches!(
                new_state,
                DmState::Turn {
                    phase: TurnPhase::Ask,
                    ..
                }
            ),
            Effect::StartTimer { node, .. } => *new_state == DmState::Thinking { node: *node },
            Effect::Speak { utterance } => !utterance.is_empty() && !utterance.contains('{'),
            Effect::Prepare => false,
            Effect::PublishState | Effect::Complete { .. } => true,
        };
        if !ok {
            return false;
        }
    }
    true
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Invariant 1: every reachable state refers to a node of the right kind
    #[test]
    fn prop_transitions_preserve_validity(
        task in arb_task(),
        pick in 0usize..3,
        events in proptest::collection::vec(arb_event(), 0..60)
    ) {
        let ctx = test_context(task, None, pick);
        let mut state = DmState::Prepare;
        let mut slots = SlotStore::new();

        for event in events {
            if let Ok(result) = transition(&state, &slots, &ctx, event) {
                slots.apply_all(result.slot_ops);
                state = result.new_state;
                prop_assert!(state_matches_policy(&state, &ctx), "Invalid state: {:?}", state);
                prop_assert!(
                    effects_are_valid(&result.effects, &state),
                    "Invalid effects for state {:?}: {:?}",
                    state,
                    result.effects
                );
            }
        }
    }

    // Invariant 2: a configured retry cap is never exceeded
    #[test]
    fn prop_retries_bounded(
        task in arb_task(),
        max in 0u32..4,
        events in proptest::collection::vec(arb_event(), 0..80)
    ) {
        let ctx = test_context(task, Some(max), 0);
        let mut state = DmState::WaitToStart;
        let mut slots = SlotStore::new();

        for event in events {
            if let Ok(result) = transition(&state, &slots, &ctx, event) {
                slots.apply_all(result.slot_ops);
                state = result.new_state;
                if let DmState::Turn { retries, .. } = state {
                    prop_assert!(retries <= max, "retries {} > cap {}", retries, max);
                }
            }
        }
    }

    // Invariant 3: once the adapter is ready, Start always restarts the task
    #[test]
    fn prop_start_restarts_from_anywhere(
        task in arb_task(),
        events in proptest::collection::vec(arb_event(), 0..40)
    ) {
        let ctx = test_context(task, None, 0);
        let mut state = DmState::Prepare;
        let mut slots = SlotStore::new();

        for event in events {
            match transition(&state, &slots, &ctx, Event::Start) {
                Ok(restart) => {
                    prop_assert!(state != DmState::Prepare);
                    prop_assert_eq!(restart.slot_ops.first(), Some(&SlotOp::ResetAll));
                    prop_assert_eq!(restart.new_state.node(), Some(ctx.policy.entry()));
                }
                Err(e) => {
                    prop_assert_eq!(&state, &DmState::Prepare);
                    prop_assert_eq!(e, TransitionError::NotReady);
                }
            }
            if let Ok(result) = transition(&state, &slots, &ctx, event) {
                slots.apply_all(result.slot_ops);
                state = result.new_state;
            }
        }
    }

    // Invariant 4: LISTEN_COMPLETE always resolves to some transition
    #[test]
    fn prop_listen_complete_always_resolves(
        task in arb_task(),
        recognised in proptest::option::of(arb_recognised()),
    ) {
        let ctx = test_context(task, None, 0);
        for node in ctx.policy.node_ids().filter(|id| ctx.policy.question(*id).is_some()) {
            let state = DmState::Turn { node, phase: TurnPhase::Ask, retries: 0 };
            let mut slots = SlotStore::new();
            if let Some(event) = recognised.clone() {
                let result = transition(&state, &slots, &ctx, event).unwrap();
                slots.apply_all(result.slot_ops);
            }
            let result = transition(&state, &slots, &ctx, Event::ListenComplete);
            prop_assert!(result.is_ok(), "{:?} at {}", result, node);
        }
    }

    // Invariant 5: a valid answer never re-prompts
    #[test]
    fn prop_accepted_answer_leaves_node(name in prop_oneof![
        Just("john"), Just("Jane."), Just("  Emma  "), Just("vlad")
    ]) {
        let ctx = test_context(TaskKind::Appointment, None, 0);
        let state = DmState::Turn { node: NodeId("ask_person"), phase: TurnPhase::Ask, retries: 2 };
        let mut slots = SlotStore::new();
        let heard = transition(&state, &slots, &ctx, Event::heard(name)).unwrap();
        slots.apply_all(heard.slot_ops);

        let result = transition(&state, &slots, &ctx, Event::ListenComplete).unwrap();
        prop_assert_eq!(
            result.new_state,
            DmState::Turn { node: NodeId("ask_date"), phase: TurnPhase::Prompt, retries: 0 }
        );
    }
}

#[test]
fn test_initial_effects_prepare_adapter() {
    assert_eq!(initial_effects(), vec![Effect::Prepare, Effect::PublishState]);
}
