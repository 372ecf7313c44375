//! Mock implementations for testing
//!
//! The scripted adapter answers each listen with the next queued reply, so a
//! whole dialogue can run end to end without a browser.

use super::traits::*;
use super::{SessionChannels, SessionEvent, SessionHandle, SessionView};
use crate::config::Lexicon;
use crate::policy::{FixedPicker, Outcome, Policy, TaskKind};
use crate::state_machine::event::{Hypothesis, NluResult};
use crate::state_machine::{DmContext, Event, ListenOptions};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

// ============================================================================
// Scripted Speech Adapter
// ============================================================================

/// What the simulated user does when the adapter listens
#[derive(Debug, Clone)]
pub enum Reply {
    Say(String),
    Silence,
    Nlu { utterance: String, nlu: NluResult },
}

impl Reply {
    pub fn say(utterance: &str) -> Self {
        Reply::Say(utterance.to_string())
    }
}

/// Adapter that completes instantly and replays queued replies
pub struct ScriptedAdapter {
    event_tx: mpsc::Sender<Event>,
    replies: Mutex<VecDeque<Reply>>,
    /// Everything spoken, in order
    pub spoken: Mutex<Vec<String>>,
    /// Options of every listen request
    pub listens: Mutex<Vec<ListenOptions>>,
    /// Number of upcoming speak calls that fail
    failing_speaks: Mutex<usize>,
}

#[allow(dead_code)]
impl ScriptedAdapter {
    pub fn new(event_tx: mpsc::Sender<Event>) -> Self {
        Self {
            event_tx,
            replies: Mutex::new(VecDeque::new()),
            spoken: Mutex::new(Vec::new()),
            listens: Mutex::new(Vec::new()),
            failing_speaks: Mutex::new(0),
        }
    }

    pub fn queue(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn queue_all(&self, replies: impl IntoIterator<Item = Reply>) {
        self.replies.lock().unwrap().extend(replies);
    }

    pub fn fail_speaks(&self, count: usize) {
        *self.failing_speaks.lock().unwrap() = count;
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn listens(&self) -> Vec<ListenOptions> {
        self.listens.lock().unwrap().clone()
    }

    fn post(&self, events: Vec<Event>) {
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            for event in events {
                let _ = event_tx.send(event).await;
            }
        });
    }
}

#[async_trait]
impl SpeechAdapter for ScriptedAdapter {
    async fn prepare(&self, _settings: &AdapterSettings) -> Result<(), AdapterError> {
        self.post(vec![Event::AdapterReady]);
        Ok(())
    }

    async fn speak(&self, utterance: &str) -> Result<(), AdapterError> {
        {
            let mut failing = self.failing_speaks.lock().unwrap();
            if *failing > 0 {
                *failing -= 1;
                return Err(AdapterError::Unavailable("speaker disconnected".to_string()));
            }
        }
        self.spoken.lock().unwrap().push(utterance.to_string());
        self.post(vec![Event::SpeakComplete]);
        Ok(())
    }

    async fn listen(&self, options: &ListenOptions) -> Result<(), AdapterError> {
        self.listens.lock().unwrap().push(*options);
        // An exhausted script leaves the microphone open forever
        let Some(reply) = self.replies.lock().unwrap().pop_front() else {
            return Ok(());
        };
        let heard = match reply {
            Reply::Say(utterance) => Event::heard(utterance),
            Reply::Silence => Event::NoInput,
            Reply::Nlu { utterance, nlu } => Event::Recognised {
                hypotheses: vec![Hypothesis::new(utterance)],
                nlu: Some(nlu),
            },
        };
        self.post(vec![heard, Event::ListenComplete]);
        Ok(())
    }
}

// ============================================================================
// Test Session Builder
// ============================================================================

/// A running session wired to a scripted adapter
pub struct TestSession {
    pub handle: SessionHandle,
    pub adapter: Arc<ScriptedAdapter>,
    pub broadcast_rx: broadcast::Receiver<SessionEvent>,
}

pub struct TestSessionBuilder {
    task: TaskKind,
    lexicon: Lexicon,
    pick: usize,
    max_retries: Option<u32>,
    thinking_time: Duration,
    replies: Vec<Reply>,
}

#[allow(dead_code)]
impl TestSessionBuilder {
    pub fn new(task: TaskKind) -> Self {
        Self {
            task,
            lexicon: Lexicon::default(),
            pick: 0,
            max_retries: None,
            thinking_time: Duration::from_millis(10),
            replies: Vec::new(),
        }
    }

    pub fn lexicon(mut self, lexicon: Lexicon) -> Self {
        self.lexicon = lexicon;
        self
    }

    pub fn pick(mut self, index: usize) -> Self {
        self.pick = index;
        self
    }

    pub fn max_retries(mut self, max: u32) -> Self {
        self.max_retries = Some(max);
        self
    }

    pub fn thinking_time(mut self, thinking_time: Duration) -> Self {
        self.thinking_time = thinking_time;
        self
    }

    pub fn replies(mut self, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.replies.extend(replies);
        self
    }

    pub fn build(self) -> TestSession {
        let context = DmContext::new(
            "test-session",
            Arc::new(Policy::for_task(self.task).unwrap()),
            Arc::new(self.lexicon),
        )
        .with_picker(Arc::new(FixedPicker(self.pick)))
        .with_today(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        .with_thinking_time(self.thinking_time)
        .with_max_retries(self.max_retries)
        .with_no_input_timeout(Duration::from_millis(100));

        let channels = SessionChannels::new();
        // Subscribe before the runtime starts so no event is missed
        let broadcast_rx = channels.broadcast_tx.subscribe();
        let adapter = Arc::new(ScriptedAdapter::new(channels.event_tx.clone()));
        adapter.queue_all(self.replies);

        let settings = AdapterSettings {
            locale: "en-US".to_string(),
            voice: "en-US-DavisNeural".to_string(),
        };
        let handle = SessionHandle::spawn_with(context, adapter.clone(), settings, channels);

        TestSession {
            handle,
            adapter,
            broadcast_rx,
        }
    }
}

impl TestSession {
    pub fn builder(task: TaskKind) -> TestSessionBuilder {
        TestSessionBuilder::new(task)
    }

    /// Press start once the adapter is ready
    pub async fn start(&mut self) {
        assert!(
            self.wait_for_state("wait_to_start", Duration::from_secs(2))
                .await
                .is_some(),
            "adapter never became ready"
        );
        self.handle
            .send_event(Event::Start)
            .await
            .expect("Failed to send start");
    }

    /// Wait for a state change into `expected` (a `DmState::name`)
    pub async fn wait_for_state(&mut self, expected: &str, timeout: Duration) -> Option<SessionView> {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(50), self.broadcast_rx.recv()).await {
                Ok(Ok(SessionEvent::StateChange { view })) if view.state.name() == expected => {
                    return Some(view);
                }
                _ => continue,
            }
        }
        None
    }

    /// Collect outcomes until the dialogue reaches `Done`
    pub async fn outcomes_until_done(&mut self, timeout: Duration) -> Option<Vec<Outcome>> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut outcomes = Vec::new();
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(50), self.broadcast_rx.recv()).await {
                Ok(Ok(SessionEvent::Outcome { outcome })) => outcomes.push(outcome),
                Ok(Ok(SessionEvent::StateChange { view })) if view.state.name() == "done" => {
                    return Some(outcomes);
                }
                _ => continue,
            }
        }
        None
    }

    /// Wait for an error broadcast
    pub async fn wait_for_error(&mut self, timeout: Duration) -> Option<String> {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(50), self.broadcast_rx.recv()).await {
                Ok(Ok(SessionEvent::Error { message })) => return Some(message),
                _ => continue,
            }
        }
        None
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::NodeId;
    use crate::slots::SlotName;
    use crate::state_machine::event::Entity;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn says(words: &[&str]) -> Vec<Reply> {
        words.iter().map(|w| Reply::say(w)).collect()
    }

    #[tokio::test]
    async fn test_appointment_with_time() {
        let mut session = TestSession::builder(TaskKind::Appointment)
            .replies(says(&["John", "Monday", "no", "14:00", "yes"]))
            .build();
        session.start().await;

        let outcomes = session.outcomes_until_done(TIMEOUT).await.unwrap();
        assert_eq!(
            outcomes,
            vec![Outcome::Booked {
                person: "John".to_string(),
                date: "Monday".to_string(),
                time: Some("14:00".to_string()),
            }]
        );

        let view = session.handle.view().await;
        assert_eq!(view.slots.get(&SlotName::Person).map(String::as_str), Some("John"));
        assert_eq!(view.slots.get(&SlotName::Date).map(String::as_str), Some("Monday"));
        assert_eq!(view.slots.get(&SlotName::Time).map(String::as_str), Some("14:00"));
        assert_eq!(view.prompt.as_deref(), Some("Your appointment has been created!"));

        let spoken = session.adapter.spoken();
        assert_eq!(spoken[0], "Let's create an appointment!");
        assert!(spoken.contains(
            &"Do you want me to create an appointment with John on Monday at 14:00?".to_string()
        ));
    }

    #[tokio::test]
    async fn test_whole_day_appointment() {
        let mut session = TestSession::builder(TaskKind::Appointment)
            .replies(says(&["emma", "tomorrow", "yes", "yes"]))
            .build();
        session.start().await;

        let outcomes = session.outcomes_until_done(TIMEOUT).await.unwrap();
        assert_eq!(
            outcomes,
            vec![Outcome::Booked {
                person: "Emma".to_string(),
                date: "Tomorrow".to_string(),
                time: None,
            }]
        );
    }

    #[tokio::test]
    async fn test_silence_and_nonsense_reprompt() {
        let mut replies = vec![Reply::Silence, Reply::say("blorp")];
        replies.extend(says(&["jane", "friday", "yes", "yes"]));
        let mut session = TestSession::builder(TaskKind::Appointment)
            .replies(replies)
            .build();
        session.start().await;

        assert!(session.outcomes_until_done(TIMEOUT).await.is_some());
        let spoken = session.adapter.spoken();
        assert_eq!(
            &spoken[1..4],
            &[
                "Who are you meeting with?".to_string(),
                "I can't hear you! Who are you meeting with?".to_string(),
                "Sorry, I don't know anyone by that name. Who are you meeting with?".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_confirmation_no_starts_over() {
        let mut session = TestSession::builder(TaskKind::Appointment)
            .replies(says(&[
                "john", "monday", "yes", "no", "jane", "tuesday", "yes", "yes",
            ]))
            .build();
        session.start().await;

        let outcomes = session.outcomes_until_done(TIMEOUT).await.unwrap();
        assert_eq!(
            outcomes,
            vec![Outcome::Booked {
                person: "Jane".to_string(),
                date: "Tuesday".to_string(),
                time: None,
            }]
        );
    }

    #[tokio::test]
    async fn test_retry_cap_abandons_session() {
        let mut session = TestSession::builder(TaskKind::Appointment)
            .max_retries(1)
            .replies(vec![Reply::Silence, Reply::Silence])
            .build();
        session.start().await;

        let outcomes = session.outcomes_until_done(TIMEOUT).await.unwrap();
        assert_eq!(outcomes, vec![Outcome::Abandoned]);
    }

    #[tokio::test]
    async fn test_restart_recovers_stalled_listen() {
        // An empty script leaves the first question listening forever
        let mut session = TestSession::builder(TaskKind::Appointment).build();
        session.start().await;
        tokio::time::timeout(TIMEOUT, async {
            while session.adapter.listens().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("first question never listened");

        session
            .adapter
            .queue_all(says(&["John", "Monday", "yes", "yes"]));
        session.handle.send_event(Event::Start).await.unwrap();

        let outcomes = session.outcomes_until_done(TIMEOUT).await.unwrap();
        assert_eq!(
            outcomes,
            vec![Outcome::Booked {
                person: "John".to_string(),
                date: "Monday".to_string(),
                time: None,
            }]
        );
        let greetings = session
            .adapter
            .spoken()
            .iter()
            .filter(|u| *u == "Let's create an appointment!")
            .count();
        assert_eq!(greetings, 2);
    }

    #[tokio::test]
    async fn test_restart_during_thinking_time() {
        let mut session = TestSession::builder(TaskKind::Guessing)
            .thinking_time(Duration::from_millis(300))
            .replies(says(&["no"]))
            .build();
        session.start().await;
        assert!(session.wait_for_state("thinking", TIMEOUT).await.is_some());

        session.handle.send_event(Event::Start).await.unwrap();
        let view = session.wait_for_state("turn", TIMEOUT).await.unwrap();
        assert_eq!(view.state.node(), Some(NodeId("welcome")));

        // The aborted timer never moves the new dialogue on
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(
            session.handle.view().await.state.node(),
            Some(NodeId("welcome"))
        );
    }

    #[tokio::test]
    async fn test_failed_speak_still_publishes_state() {
        let mut session = TestSession::builder(TaskKind::Appointment)
            .replies(says(&["John", "Monday", "yes", "yes"]))
            .build();
        session.adapter.fail_speaks(1);
        session.start().await;

        // The state change goes out before the error is reported
        let view = session.wait_for_state("speaking", TIMEOUT).await.unwrap();
        assert_eq!(view.prompt.as_deref(), Some("Let's create an appointment!"));
        let message = session.wait_for_error(TIMEOUT).await.unwrap();
        assert!(message.contains("speaker disconnected"));

        // No speak completion will arrive; a restart recovers the session
        session.handle.send_event(Event::Start).await.unwrap();
        assert!(session.outcomes_until_done(TIMEOUT).await.is_some());
    }

    #[tokio::test]
    async fn test_guessing_game_round() {
        let color = Reply::Nlu {
            utterance: "it's white I think".to_string(),
            nlu: NluResult {
                top_intent: Some("describe".to_string()),
                entities: vec![Entity {
                    category: "color".to_string(),
                    text: "white".to_string(),
                    confidence: Some(0.97),
                }],
            },
        };
        let mut replies = vec![Reply::say("no"), color];
        replies.extend(says(&["bell", "yes", "yes", "yes", "no"]));

        let mut session = TestSession::builder(TaskKind::Guessing)
            .pick(0)
            .replies(replies)
            .build();
        session.start().await;

        let outcomes = session.outcomes_until_done(TIMEOUT).await.unwrap();
        assert_eq!(
            outcomes,
            vec![
                Outcome::Won {
                    fungus: "shaggy ink cap".to_string(),
                    description: Some(
                        "A shaggy bell that digests itself into black ink.".to_string()
                    ),
                },
                Outcome::Goodbye,
            ]
        );

        let spoken = session.adapter.spoken();
        assert!(spoken.contains(&"Do you think the fungus is edible?".to_string()));
        assert!(session.adapter.listens().iter().all(|l| l.nlu));
    }

    #[tokio::test]
    async fn test_guessing_game_play_again() {
        let mut replies = says(&["yes", "red", "umbrella", "no", "no", "yes", "yes"]);
        replies.extend(says(&["orange", "funnel", "no", "yes", "no", "no"]));

        let mut session = TestSession::builder(TaskKind::Guessing)
            .pick(0)
            .replies(replies)
            .build();
        session.start().await;

        let outcomes = session.outcomes_until_done(TIMEOUT).await.unwrap();
        assert_eq!(
            outcomes,
            vec![
                Outcome::Won {
                    fungus: "fly agaric".to_string(),
                    description: Some(
                        "The red cap with white spots. Poisonous and hallucinogenic.".to_string()
                    ),
                },
                Outcome::Lost {
                    guess: Some("chanterelle".to_string())
                },
                Outcome::Goodbye,
            ]
        );
    }
}
