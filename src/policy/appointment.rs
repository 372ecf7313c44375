//! Appointment booking: who, which day, whole day or what time, confirm

use super::{EnterAction, Expect, Next, Node, NodeId, OutcomeKind, Policy, PolicyError, Question, TaskKind};
use crate::slots::SlotName;
use crate::validators::Category;

const GREETING: NodeId = NodeId("greeting");
const ASK_PERSON: NodeId = NodeId("ask_person");
const ASK_DATE: NodeId = NodeId("ask_date");
const ASK_WHOLE_DAY: NodeId = NodeId("ask_whole_day");
const ASK_TIME: NodeId = NodeId("ask_time");
const CONFIRM_WHOLE_DAY: NodeId = NodeId("confirm_whole_day");
const CONFIRM_WITH_TIME: NodeId = NodeId("confirm_with_time");
const BOOKED: NodeId = NodeId("booked");
const ABANDON: NodeId = NodeId("abandon");

fn confirm(prompt: &str) -> Question {
    Question::new(SlotName::Confirmation, Category::YesNo, prompt)
        .on_invalid(&format!("Please answer yes or no. {prompt}"))
        .on_no_input(&format!("I can't hear you! Could you say it again? {prompt}"))
        .route(Expect::Value("yes"), BOOKED)
        .route(Expect::Value("no"), ASK_PERSON)
        .with_fallbacks()
}

pub(super) fn policy() -> Result<Policy, PolicyError> {
    let nodes = vec![
        Node::say(GREETING, "Let's create an appointment!", Next::Node(ASK_PERSON)),
        Node::question(
            ASK_PERSON,
            Question::new(SlotName::Person, Category::Name, "Who are you meeting with?")
                .on_invalid("Sorry, I don't know anyone by that name. Who are you meeting with?")
                .route(Expect::Any, ASK_DATE)
                .with_fallbacks(),
        ),
        Node::question(
            ASK_DATE,
            Question::new(SlotName::Date, Category::Date, "On which day is your meeting?")
                .on_invalid("I can't understand that day. On which day is your meeting?")
                .route(Expect::Any, ASK_WHOLE_DAY)
                .with_fallbacks(),
        ),
        Node::question(
            ASK_WHOLE_DAY,
            Question::new(SlotName::WholeDay, Category::YesNo, "Will it take the whole day?")
                .on_invalid("Please answer yes or no. Will it take the whole day?")
                .route(Expect::Value("no"), ASK_TIME)
                .route(Expect::Value("yes"), CONFIRM_WHOLE_DAY)
                .with_fallbacks(),
        ),
        Node::question(
            ASK_TIME,
            Question::new(SlotName::Time, Category::Time, "What time is your meeting?")
                .on_invalid("I can't understand that time. What time is your meeting?")
                .route(Expect::Any, CONFIRM_WITH_TIME)
                .with_fallbacks(),
        ),
        Node::question(
            CONFIRM_WHOLE_DAY,
            confirm("Do you want me to create an appointment with {person} on {date} for the whole day?"),
        ),
        Node::question(
            CONFIRM_WITH_TIME,
            confirm("Do you want me to create an appointment with {person} on {date} at {time}?"),
        ),
        Node::say(BOOKED, "Your appointment has been created!", Next::Done)
            .on_enter(EnterAction::Report(OutcomeKind::Booked)),
        Node::say(
            ABANDON,
            "Sorry, I'm having trouble understanding you. Let's try again later.",
            Next::Done,
        )
        .on_enter(EnterAction::Report(OutcomeKind::Abandoned)),
    ];

    Policy::new(TaskKind::Appointment, GREETING, ABANDON, nodes)
}
