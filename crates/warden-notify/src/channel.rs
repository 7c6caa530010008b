//! The notification channel contract and the logging channel.
//!
//! This module provides the [`NotificationChannel`] trait and [`LogChannel`],
//! which writes messages to the tracing log instead of delivering them.

use std::fmt;

use futures::future::BoxFuture;
use tracing::info;
use uuid::Uuid;
use warden_proto::CorrelationId;

use crate::error::{ChannelError, Result};

/// A destination for incident messages.
///
/// A message is sent once and later edited in place; the returned
/// [`CorrelationId`] is the only handle the caller keeps. Channels must be
/// safe to call concurrently from several watchers.
pub trait NotificationChannel: Send + Sync + fmt::Debug {
    /// Returns the name of this channel.
    fn name(&self) -> &str;

    /// Sends a new message and returns its handle.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Send`] if no message could be delivered.
    fn send<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<CorrelationId>>;

    /// Replaces the text of a previously sent message.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Edit`] classified as
    /// [`EditFailure::NotFound`](crate::EditFailure::NotFound) when the
    /// message is gone, or [`EditFailure::Transient`](crate::EditFailure::Transient)
    /// otherwise.
    fn edit<'a>(&'a self, id: &'a CorrelationId, text: &'a str) -> BoxFuture<'a, Result<()>>;
}

/// Channel that only logs messages. Used for dry runs.
#[derive(Debug, Clone, Default)]
pub struct LogChannel {
    name: String,
}

impl LogChannel {
    /// Creates a new log channel.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl NotificationChannel for LogChannel {
    fn name(&self) -> &str {
        if self.name.is_empty() { "log" } else { &self.name }
    }

    fn send<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<CorrelationId>> {
        Box::pin(async move {
            let id = CorrelationId::new(format!("log:{}", Uuid::new_v4()))
                .map_err(|e| ChannelError::send(self.name(), e.to_string()))?;
            info!(channel = %self.name(), correlation_id = %id, "\n{text}");
            Ok(id)
        })
    }

    fn edit<'a>(&'a self, id: &'a CorrelationId, text: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            info!(channel = %self.name(), correlation_id = %id, edit = true, "\n{text}");
            Ok(())
        })
    }
}
