// Copyright 2026 Pitsync Contributors
// SPDX-License-Identifier: Apache-2.0

//! Run event bus — typed progress and log events for UI callers.
//!
//! The runner emits [`RunEvent`] values through a `tokio::sync::broadcast`
//! channel. Any consumer — the CLI progress bar, a GUI log pane, a test —
//! can subscribe independently. When no subscribers exist, events are
//! silently dropped (zero overhead). Events are one-way notifications and
//! never require a response.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Severity of a [`RunEvent::Log`] line, for color-coded rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// Every event a run emits. Serialized to JSON for machine consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RunEvent {
    /// An authentication flow has started.
    AuthStarted { method: String },
    /// Authentication finished, successfully or not.
    AuthCompleted { method: String, success: bool },
    /// The setups page is being fetched and classified.
    ScrapeStarted { url: String },
    /// Classification finished; this many active listings will be processed.
    ListingsFound { active: usize },
    /// Emitted after each listing is processed.
    Progress {
        processed: usize,
        total: usize,
        current: String,
    },
    /// A single listing failed; the run continues.
    ListingFailed { name: String, reason: String },
    /// A human-readable log line for the caller's log view.
    Log { level: LogLevel, message: String },
    /// The run reached a terminal status.
    RunFinished {
        status: String,
        processed: usize,
        succeeded: usize,
        failed: usize,
    },
}

/// Broadcast bus carrying [`RunEvent`]s from the runner to its subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RunEvent>,
}

impl EventBus {
    /// Create a bus with a bounded buffer. 256 events comfortably covers a
    /// weekly run (a handful of phase events plus one per listing).
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    /// Emit an event to all subscribers. Silently ignored when nobody listens.
    pub fn emit(&self, event: RunEvent) {
        let _ = self.sender.send(event);
    }

    /// Shorthand for emitting a [`RunEvent::Log`] line.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(RunEvent::Log {
            level,
            message: message.into(),
        });
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
