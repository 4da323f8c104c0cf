//! Lifecycle events and the sinks that observe them

use std::fmt;
use std::sync::mpsc::Sender;

/// Prefix for fully qualified event action names
pub const ACTION_PREFIX: &str = "org.layersync";

/// Lifecycle event emitted for a sync pass
///
/// Events carry no payload beyond their name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncEvent {
    Start,
    Finish,
    Canceled,
    Changes,
}

impl SyncEvent {
    /// Short event name (e.g. `sync_start`)
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncEvent::Start => "sync_start",
            SyncEvent::Finish => "sync_finish",
            SyncEvent::Canceled => "sync_canceled",
            SyncEvent::Changes => "sync_changes",
        }
    }

    /// Fully qualified action name (e.g. `org.layersync.sync_start`)
    pub fn action(&self) -> String {
        format!("{}.{}", ACTION_PREFIX, self.as_str())
    }

    /// Parse a short or fully qualified event name
    pub fn parse(name: &str) -> Option<Self> {
        let short = name
            .strip_prefix(ACTION_PREFIX)
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(name);
        match short {
            "sync_start" => Some(SyncEvent::Start),
            "sync_finish" => Some(SyncEvent::Finish),
            "sync_canceled" => Some(SyncEvent::Canceled),
            "sync_changes" => Some(SyncEvent::Changes),
            _ => None,
        }
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observer of lifecycle events
///
/// Sinks must tolerate a late or duplicated `sync_canceled` relative to
/// `sync_finish` across passes.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SyncEvent);
}

impl<F> EventSink for F
where
    F: Fn(SyncEvent) + Send + Sync,
{
    fn emit(&self, event: SyncEvent) {
        self(event)
    }
}

/// Sink that forwards events into an mpsc channel
///
/// A disconnected receiver is not an error; the event is dropped.
pub struct ChannelEventSink {
    tx: Sender<SyncEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: Sender<SyncEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: SyncEvent) {
        if self.tx.send(event).is_err() {
            log::trace!("Dropped {} (receiver gone)", event);
        }
    }
}

/// Sink that only writes events to the log
#[derive(Debug, Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, event: SyncEvent) {
        log::info!("{}", event.action());
    }
}
