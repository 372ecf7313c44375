//! Dialogue runtime executor

use super::traits::{AdapterSettings, SpeechAdapter};
use super::{SessionEvent, SessionView};

use crate::slots::SlotStore;
use crate::state_machine::transition::initial_effects;
use crate::state_machine::{transition, DmContext, DmState, Effect, Event, TransitionError};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;

/// Generic dialogue runtime that can work with any speech adapter
pub struct DialogueRuntime<A>
where
    A: SpeechAdapter + 'static,
{
    context: DmContext,
    state: DmState,
    slots: SlotStore,
    adapter: Arc<A>,
    adapter_settings: AdapterSettings,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    view: Arc<RwLock<SessionView>>,
    /// Pending thinking-time timer
    timer: Option<JoinHandle<()>>,
}

impl<A> DialogueRuntime<A>
where
    A: SpeechAdapter + 'static,
{
    pub fn new(
        context: DmContext,
        adapter: A,
        adapter_settings: AdapterSettings,
        event_rx: mpsc::Receiver<Event>,
        event_tx: mpsc::Sender<Event>,
        broadcast_tx: broadcast::Sender<SessionEvent>,
        view: Arc<RwLock<SessionView>>,
    ) -> Self {
        Self {
            context,
            state: DmState::default(),
            slots: SlotStore::new(),
            adapter: Arc::new(adapter),
            adapter_settings,
            event_rx,
            event_tx,
            broadcast_tx,
            view,
            timer: None,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            session_id = %self.context.session_id,
            task = %self.context.policy.task(),
            "Starting dialogue runtime"
        );

        for effect in initial_effects() {
            if let Err(e) = self.execute_effect(effect).await {
                tracing::error!(error = %e, "Failed to initialize speech adapter");
                let _ = self.broadcast_tx.send(SessionEvent::Error { message: e });
            }
        }

        // Process events in a loop - no recursion
        loop {
            tokio::select! {
                Some(event) = self.event_rx.recv() => {
                    if let Err(e) = self.process_event(event).await {
                        tracing::error!(error = %e, "Error handling event");
                        let _ = self.broadcast_tx.send(SessionEvent::Error {
                            message: e.clone(),
                        });
                    }
                }
                else => break,
            }
        }

        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        tracing::info!(session_id = %self.context.session_id, "Dialogue runtime stopped");
    }

    async fn process_event(&mut self, event: Event) -> Result<(), String> {
        let event_name = event.name();
        let is_start = matches!(event, Event::Start);

        let result = match transition(&self.state, &self.slots, &self.context, event) {
            Ok(r) => r,
            // Late adapter events and stale timers land here
            Err(TransitionError::InvalidTransition(reason)) => {
                tracing::debug!(event = event_name, state = self.state.name(), %reason, "Ignoring event");
                return Ok(());
            }
            Err(e) => return Err(e.to_string()),
        };

        tracing::debug!(
            event = event_name,
            from = self.state.name(),
            to = result.new_state.name(),
            node = ?result.new_state.node(),
            "Transition"
        );

        if is_start {
            if self.state.is_active() {
                tracing::info!(from = self.state.name(), "Restarting conversation");
            }
            // A thinking timer from the abandoned dialogue must not fire
            if let Some(timer) = self.timer.take() {
                timer.abort();
            }
            self.view.write().await.outcome = None;
        }

        self.state = result.new_state;
        self.slots.apply_all(result.slot_ops);

        // State is already committed, so every effect runs even if one fails
        let mut errors = Vec::new();
        for effect in result.effects {
            if let Err(e) = self.execute_effect(effect).await {
                errors.push(e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("; "))
        }
    }

    async fn execute_effect(&mut self, effect: Effect) -> Result<(), String> {
        match effect {
            Effect::Prepare => self
                .adapter
                .prepare(&self.adapter_settings)
                .await
                .map_err(|e| e.to_string()),

            Effect::Speak { utterance } => {
                tracing::info!(utterance = %utterance, "Speak");
                self.view.write().await.prompt = Some(utterance.clone());
                self.adapter.speak(&utterance).await.map_err(|e| e.to_string())
            }

            Effect::Listen { options } => {
                self.adapter.listen(&options).await.map_err(|e| e.to_string())
            }

            Effect::StartTimer { node, delay } => {
                if let Some(previous) = self.timer.take() {
                    previous.abort();
                }
                let event_tx = self.event_tx.clone();
                self.timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = event_tx.send(Event::TimerElapsed { node }).await;
                }));
                Ok(())
            }

            Effect::PublishState => {
                let view = {
                    let mut view = self.view.write().await;
                    view.refresh(&self.state, &self.slots);
                    view.clone()
                };
                let _ = self.broadcast_tx.send(SessionEvent::StateChange { view });
                Ok(())
            }

            Effect::Complete { outcome } => {
                tracing::info!(session_id = %self.context.session_id, ?outcome, "Task outcome");
                self.view.write().await.outcome = Some(outcome.clone());
                let _ = self.broadcast_tx.send(SessionEvent::Outcome { outcome });
                Ok(())
            }
        }
    }
}
