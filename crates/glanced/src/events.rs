//! Recognition event feed.
//!
//! Publishing must never block or fail the recognition path: history is
//! appended under a short lock, and live delivery goes over a lag-tolerant
//! broadcast channel that drops nothing the history doesn't keep.

use glance_core::RecognitionEvent;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

/// Sink the engine publishes recognition events into.
pub trait EventSink {
    fn publish(&self, event: RecognitionEvent);
}

/// Clone-safe event bus with retained history and a live broadcast feed.
#[derive(Clone)]
pub struct EventBus {
    history: Arc<Mutex<Vec<RecognitionEvent>>>,
    sender: broadcast::Sender<RecognitionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            history: Arc::new(Mutex::new(Vec::new())),
            sender,
        }
    }

    /// Subscribe to newly published events. Slow consumers may observe
    /// `Lagged`; the retained history stays complete regardless.
    pub fn subscribe(&self) -> broadcast::Receiver<RecognitionEvent> {
        self.sender.subscribe()
    }

    /// All retained events, oldest first.
    pub fn history(&self) -> Vec<RecognitionEvent> {
        self.lock_history().clone()
    }

    pub fn unread_count(&self) -> usize {
        self.lock_history().iter().filter(|e| !e.read).count()
    }

    /// Mark one event read. Returns false if the id is unknown.
    pub fn mark_read(&self, event_id: &str) -> bool {
        let mut history = self.lock_history();
        match history.iter_mut().find(|e| e.id == event_id) {
            Some(event) => {
                event.read = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_all_read(&self) {
        for event in self.lock_history().iter_mut() {
            event.read = true;
        }
    }

    fn lock_history(&self) -> std::sync::MutexGuard<'_, Vec<RecognitionEvent>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventSink for EventBus {
    fn publish(&self, event: RecognitionEvent) {
        self.lock_history().push(event.clone());
        // Err here only means no live subscriber; history already has it.
        let _ = self.sender.send(event);
    }
}
