//! Fungus guessing game
//!
//! The player thinks of a fungus; the system asks color, shape, size and one
//! randomly chosen specialty question, then guesses the best-scoring profile.
//! Every round ends at "play again?".

use super::{EnterAction, Expect, Next, Node, NodeId, OutcomeKind, Policy, PolicyError, Question, TaskKind};
use crate::slots::SlotName;
use crate::validators::Category;

const WELCOME: NodeId = NodeId("welcome");
const RULES: NodeId = NodeId("rules");
const START_ROUND: NodeId = NodeId("start_round");
const THINKING: NodeId = NodeId("thinking");
const ASK_COLOR: NodeId = NodeId("ask_color");
const ASK_SHAPE: NodeId = NodeId("ask_shape");
const ASK_SIZE: NodeId = NodeId("ask_size");
const ASK_SPECIALTY: NodeId = NodeId("ask_specialty");
const GUESS: NodeId = NodeId("guess");
const CONFIRM_GUESS: NodeId = NodeId("confirm_guess");
const WON: NodeId = NodeId("won");
const LOST: NodeId = NodeId("lost");
const GIVE_UP: NodeId = NodeId("give_up");
const PLAY_AGAIN: NodeId = NodeId("play_again");
const NEW_ROUND: NodeId = NodeId("new_round");
const GOODBYE: NodeId = NodeId("goodbye");
const ABANDON: NodeId = NodeId("abandon");

const RULES_TEXT: &str = "Here are the rules. Think of one of the fungi on the screen and keep \
    it to yourself. I will ask you about its color, its shape, its size and one special \
    feature, and then I will try to guess which one it is. You have five seconds to choose!";

/// Slots collected in a single round
const ROUND_SLOTS: [SlotName; 6] = [
    SlotName::Color,
    SlotName::Shape,
    SlotName::Size,
    SlotName::Specialty,
    SlotName::GuessConfirmation,
    SlotName::PlayAgain,
];

pub(super) fn policy() -> Result<Policy, PolicyError> {
    let nodes = vec![
        Node::question(
            WELCOME,
            Question::new(
                SlotName::FirstTime,
                Category::YesNo,
                "Hi! Welcome to Mushroom In Mind! Is this the first time you play this game?",
            )
            .nlu()
            .on_invalid(
                "I cannot understand what you said. Please say yes if you would like to hear \
                 the rules, or say no to start the game right away!",
            )
            .on_no_input("I cannot hear you! Is this the first time you play this game?")
            .route(Expect::Value("yes"), RULES)
            .route(Expect::Value("no"), START_ROUND)
            .with_fallbacks(),
        ),
        Node::say(RULES, RULES_TEXT, Next::Node(THINKING)),
        Node::say(
            START_ROUND,
            "Nice to see you again! Let's start! You have five seconds to think of one of the fungi on the screen.",
            Next::Node(THINKING),
        ),
        Node::pause(THINKING, ASK_COLOR),
        Node::question(
            ASK_COLOR,
            Question::new(
                SlotName::Color,
                Category::Color,
                "What color is the fungus you are thinking of?",
            )
            .entity("color")
            .on_invalid("That doesn't sound like a color I know. What color is the fungus?")
            .route(Expect::Any, ASK_SHAPE)
            .with_fallbacks(),
        ),
        Node::question(
            ASK_SHAPE,
            Question::new(
                SlotName::Shape,
                Category::Shape,
                "What kind of shape does the fungus have?",
            )
            .entity("shape")
            .on_invalid(
                "I don't know that shape. Is it a bell, an umbrella, a funnel or a finger?",
            )
            .route(Expect::Any, ASK_SIZE)
            .with_fallbacks(),
        ),
        Node::question(
            ASK_SIZE,
            Question::new(SlotName::Size, Category::YesNo, "Is the fungus tall?")
                .nlu()
                .on_invalid("Please answer yes or no. Is the fungus tall?")
                .route(Expect::Any, ASK_SPECIALTY)
                .with_fallbacks(),
        ),
        Node::question(
            ASK_SPECIALTY,
            Question::new(SlotName::Specialty, Category::YesNo, "{question}")
                .nlu()
                .on_invalid("Please answer yes or no. {question}")
                .on_no_input("I cannot hear you! {question}")
                .route(Expect::Any, GUESS)
                .with_fallbacks(),
        )
        .on_enter(EnterAction::PickQuestion),
        Node::guess(GUESS, CONFIRM_GUESS, GIVE_UP),
        Node::question(
            CONFIRM_GUESS,
            Question::new(
                SlotName::GuessConfirmation,
                Category::YesNo,
                "I think you are thinking of the {guess}! Am I right?",
            )
            .nlu()
            .on_invalid("Please answer yes or no. Is it the {guess}?")
            .on_no_input("I cannot hear you! Is it the {guess}?")
            .route(Expect::Value("yes"), WON)
            .route(Expect::Value("no"), LOST)
            .with_fallbacks(),
        ),
        Node::say(WON, "Hooray, I guessed it!", Next::Node(PLAY_AGAIN))
            .on_enter(EnterAction::Report(OutcomeKind::Won)),
        Node::say(LOST, "Oh no, you got me this time!", Next::Node(PLAY_AGAIN))
            .on_enter(EnterAction::Report(OutcomeKind::Lost)),
        Node::say(
            GIVE_UP,
            "I give up! I don't know any fungus like that. You win!",
            Next::Node(PLAY_AGAIN),
        )
        .on_enter(EnterAction::Report(OutcomeKind::GaveUp)),
        Node::question(
            PLAY_AGAIN,
            Question::new(SlotName::PlayAgain, Category::YesNo, "Do you want to play again?")
                .nlu()
                .on_invalid("Please answer yes or no. Do you want to play again?")
                .route(Expect::Value("yes"), NEW_ROUND)
                .route(Expect::Value("no"), GOODBYE)
                .with_fallbacks(),
        ),
        Node::say(
            NEW_ROUND,
            "Great! Think of another fungus. I will start asking in five seconds.",
            Next::Node(THINKING),
        )
        .on_enter(EnterAction::ResetSlots(ROUND_SLOTS.to_vec())),
        Node::say(GOODBYE, "Thanks for playing Mushroom In Mind! Goodbye!", Next::Done)
            .on_enter(EnterAction::Report(OutcomeKind::Goodbye)),
        Node::say(
            ABANDON,
            "Sorry, I'm having trouble understanding you. Let's play another time!",
            Next::Done,
        )
        .on_enter(EnterAction::Report(OutcomeKind::Abandoned)),
    ];

    Policy::new(TaskKind::Guessing, WELCOME, ABANDON, nodes)
}
