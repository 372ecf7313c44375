//! Runtime for executing dialogue sessions
//!
//! The executor owns the state and slot store, feeds events through the pure
//! transition function and performs the resulting effects. Clients observe
//! the session through a broadcast channel and a shared snapshot.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::DialogueRuntime;
pub use traits::*;

use crate::policy::{Outcome, TaskKind};
use crate::slots::{SlotName, SlotStore};
use crate::state_machine::{DmContext, DmState, Event};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};

/// Snapshot of a session for the UI
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub task: TaskKind,
    pub state: DmState,
    /// Last utterance the system spoke
    pub prompt: Option<String>,
    /// Accepted slot values
    pub slots: BTreeMap<SlotName, String>,
    /// Raw utterances currently held
    pub heard: BTreeMap<SlotName, String>,
    pub guess: Option<String>,
    /// Most recent task result
    pub outcome: Option<Outcome>,
}

impl SessionView {
    pub fn new(context: &DmContext) -> Self {
        Self {
            session_id: context.session_id.clone(),
            task: context.policy.task(),
            state: DmState::default(),
            prompt: None,
            slots: BTreeMap::new(),
            heard: BTreeMap::new(),
            guess: None,
            outcome: None,
        }
    }

    fn refresh(&mut self, state: &DmState, slots: &SlotStore) {
        self.state = state.clone();
        self.slots = slots.values();
        self.heard = slots.heard_utterances();
        self.guess = slots.guess().map(str::to_string);
    }
}

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Init {
        view: SessionView,
        adapter: AdapterSettings,
    },
    StateChange {
        view: SessionView,
    },
    /// Instruction for the speech adapter running in the client
    Command {
        command: AdapterCommand,
    },
    Outcome {
        outcome: Outcome,
    },
    Error {
        message: String,
    },
}

/// Channels wiring a runtime to its handle
pub struct SessionChannels {
    pub event_tx: mpsc::Sender<Event>,
    pub event_rx: mpsc::Receiver<Event>,
    pub broadcast_tx: broadcast::Sender<SessionEvent>,
}

impl SessionChannels {
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::channel(64);
        let (broadcast_tx, _) = broadcast::channel(256);
        Self {
            event_tx,
            event_rx,
            broadcast_tx,
        }
    }
}

/// Handle to interact with a running session
#[derive(Clone)]
pub struct SessionHandle {
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    view: Arc<RwLock<SessionView>>,
    adapter: AdapterSettings,
}

impl SessionHandle {
    /// Spawn the production runtime, driven by a browser-side adapter
    pub fn spawn(context: DmContext, adapter: AdapterSettings) -> Self {
        let channels = SessionChannels::new();
        let browser = BrowserAdapter::new(channels.broadcast_tx.clone());
        Self::spawn_with(context, browser, adapter, channels)
    }

    /// Spawn a runtime around any adapter
    pub fn spawn_with<A: SpeechAdapter + 'static>(
        context: DmContext,
        speech: A,
        adapter: AdapterSettings,
        channels: SessionChannels,
    ) -> Self {
        let SessionChannels {
            event_tx,
            event_rx,
            broadcast_tx,
        } = channels;

        let view = Arc::new(RwLock::new(SessionView::new(&context)));
        let session_id = context.session_id.clone();
        let runtime = DialogueRuntime::new(
            context,
            speech,
            adapter.clone(),
            event_rx,
            event_tx.clone(),
            broadcast_tx.clone(),
            view.clone(),
        );

        tokio::spawn(async move {
            runtime.run().await;
            tracing::info!(session_id = %session_id, "Dialogue runtime finished");
        });

        Self {
            event_tx,
            broadcast_tx,
            view,
            adapter,
        }
    }

    /// Send an event to the session
    pub async fn send_event(&self, event: Event) -> Result<(), String> {
        self.event_tx
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {e}"))
    }

    /// Subscribe to session updates
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.broadcast_tx.subscribe()
    }

    pub async fn view(&self) -> SessionView {
        self.view.read().await.clone()
    }

    pub fn adapter(&self) -> &AdapterSettings {
        &self.adapter
    }
}
