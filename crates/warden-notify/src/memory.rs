//! Recording channel for tests.
//!
//! [`MemoryChannel`] keeps every message it is asked to send or edit and can
//! be told to fail upcoming calls, so callers can exercise their fallback
//! paths without a real chat service.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use warden_proto::CorrelationId;

use crate::channel::NotificationChannel;
use crate::error::{ChannelError, EditFailure, Result};

const CHANNEL_NAME: &str = "memory";

/// A call recorded by [`MemoryChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelCall {
    /// A send, with the handle that was returned (none if it failed).
    Send {
        /// Message text.
        text: String,
        /// Issued handle.
        id: Option<CorrelationId>,
    },
    /// An edit attempt.
    Edit {
        /// Target handle.
        id: CorrelationId,
        /// New text.
        text: String,
        /// Whether the edit was applied.
        applied: bool,
    },
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<ChannelCall>,
    messages: HashMap<CorrelationId, String>,
    send_failures: usize,
    edit_failures: VecDeque<EditFailure>,
}

/// In-memory [`NotificationChannel`] that records every call.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    state: Mutex<State>,
    next_id: AtomicU64,
}

impl MemoryChannel {
    /// Creates an empty channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` sends fail.
    pub fn fail_sends(&self, count: usize) {
        self.state.lock().send_failures = count;
    }

    /// Makes the next edit fail with the given class.
    pub fn fail_next_edit(&self, failure: EditFailure) {
        self.state.lock().edit_failures.push_back(failure);
    }

    /// Removes a message, as if a user deleted it. Later edits report not found.
    pub fn delete(&self, id: &CorrelationId) {
        self.state.lock().messages.remove(id);
    }

    /// Every recorded call, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ChannelCall> {
        self.state.lock().calls.clone()
    }

    /// Texts of every send attempt.
    #[must_use]
    pub fn sends(&self) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                ChannelCall::Send { text, .. } => Some(text.clone()),
                ChannelCall::Edit { .. } => None,
            })
            .collect()
    }

    /// Targets and texts of every edit attempt.
    #[must_use]
    pub fn edits(&self) -> Vec<(CorrelationId, String)> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                ChannelCall::Edit { id, text, .. } => Some((id.clone(), text.clone())),
                ChannelCall::Send { .. } => None,
            })
            .collect()
    }

    /// The current text of a message.
    #[must_use]
    pub fn message(&self, id: &CorrelationId) -> Option<String> {
        self.state.lock().messages.get(id).cloned()
    }

    /// Forgets recorded calls, keeping delivered messages.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }
}

impl NotificationChannel for MemoryChannel {
    fn name(&self) -> &str {
        CHANNEL_NAME
    }

    fn send<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<CorrelationId>> {
        Box::pin(async move {
            let mut state = self.state.lock();
            if state.send_failures > 0 {
                state.send_failures -= 1;
                state.calls.push(ChannelCall::Send {
                    text: text.to_string(),
                    id: None,
                });
                return Err(ChannelError::send(CHANNEL_NAME, "injected failure"));
            }

            let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
            let id = CorrelationId::new(format!("msg-{n}"))
                .map_err(|e| ChannelError::send(CHANNEL_NAME, e.to_string()))?;
            state.messages.insert(id.clone(), text.to_string());
            state.calls.push(ChannelCall::Send {
                text: text.to_string(),
                id: Some(id.clone()),
            });
            Ok(id)
        })
    }

    fn edit<'a>(&'a self, id: &'a CorrelationId, text: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock();
            let failure = match state.edit_failures.pop_front() {
                Some(failure) => Some(failure),
                None if !state.messages.contains_key(id) => Some(EditFailure::NotFound),
                None => None,
            };

            state.calls.push(ChannelCall::Edit {
                id: id.clone(),
                text: text.to_string(),
                applied: failure.is_none(),
            });

            if let Some(failure) = failure {
                return Err(ChannelError::edit(CHANNEL_NAME, failure, "injected failure"));
            }
            state.messages.insert(id.clone(), text.to_string());
            Ok(())
        })
    }
}
