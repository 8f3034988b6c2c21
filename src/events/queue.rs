//! Timestamp-ordered event queue and cross-thread sender.

use super::event::InputEvent;
use crate::error::{IngressError, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::collections::VecDeque;

/// Events waiting for the next tick, oldest first. Events with equal
/// timestamps keep their queueing order.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<InputEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn push(&mut self, event: InputEvent) {
        // Producers almost always queue in order; scan from the back.
        let at = self
            .events
            .iter()
            .rposition(|e| e.timestamp <= event.timestamp)
            .map_or(0, |i| i + 1);
        self.events.insert(at, event);
    }

    pub fn pop(&mut self) -> Option<InputEvent> {
        self.events.pop_front()
    }

    pub fn peek(&self) -> Option<&InputEvent> {
        self.events.front()
    }

    /// Remove up to `max` of the oldest events. Events queued while the
    /// returned batch is processed wait for the next call.
    pub fn take_batch(&mut self, max: usize) -> Vec<InputEvent> {
        let n = max.min(self.events.len());
        self.events.drain(..n).collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Drop every event of one device.
    pub fn remove_device(&mut self, device: crate::types::DeviceId) -> usize {
        let before = self.events.len();
        self.events.retain(|e| e.device_id != device);
        before - self.events.len()
    }
}

/// Cloneable handle for queueing events from other threads.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<InputEvent>,
}

impl EventSender {
    /// Queue without blocking. Fails when the channel is full or the
    /// runtime has been dropped.
    pub fn send(&self, event: InputEvent) -> Result<()> {
        self.tx.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => IngressError::Channel("event channel full".to_string()),
            TrySendError::Disconnected(_) => {
                IngressError::Channel("event channel disconnected".to_string())
            }
        })
    }
}

/// Bounded channel feeding a runtime.
pub fn event_channel(capacity: usize) -> (EventSender, Receiver<InputEvent>) {
    let (tx, rx) = bounded(capacity);
    (EventSender { tx }, rx)
}
