//! Lifecycle notifications for a single sync pass

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use anyhow::Result;

use crate::cancel::CancellationFlag;
use crate::events::{EventSink, SyncEvent};
use crate::models::{PassOutcome, SyncResult};
use crate::storage::{KEY_LAST_SYNC_TIMESTAMP, SettingsStore};

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const FINISHED: u8 = 2;
const CANCELED: u8 = 3;

/// Emits start/finish/canceled events for one pass and records the
/// last-sync timestamp
///
/// The terminal event is decided by whichever of [`notify_finish`] and
/// [`notify_canceled`] gets there first; the other becomes a logged no-op.
/// This lets the host cancel out-of-band while the pass is still unwinding.
///
/// [`notify_finish`]: LifecycleNotifier::notify_finish
/// [`notify_canceled`]: LifecycleNotifier::notify_canceled
pub struct LifecycleNotifier {
    sink: Arc<dyn EventSink>,
    settings: Arc<dyn SettingsStore>,
    state: AtomicU8,
}

impl LifecycleNotifier {
    pub fn new(sink: Arc<dyn EventSink>, settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            sink,
            settings,
            state: AtomicU8::new(IDLE),
        }
    }

    fn transition(&self, from: u8, to: u8) -> bool {
        self.state
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Emit `sync_start`; ignored if the pass already started
    pub fn notify_start(&self) {
        if self.transition(IDLE, RUNNING) {
            self.sink.emit(SyncEvent::Start);
        } else {
            log::debug!("Ignoring duplicate sync start");
        }
    }

    /// Emit `sync_changes` while the pass is running
    pub fn notify_changes(&self) {
        if self.state.load(Ordering::Acquire) == RUNNING {
            self.sink.emit(SyncEvent::Changes);
        }
    }

    /// Emit `sync_finish` unless the pass already ended
    ///
    /// Returns whether this call ended the pass.
    pub fn notify_finish(&self) -> bool {
        if self.transition(RUNNING, FINISHED) {
            self.sink.emit(SyncEvent::Finish);
            true
        } else {
            log::debug!("Ignoring late sync finish");
            false
        }
    }

    /// Emit `sync_canceled` unless the pass already ended
    ///
    /// May be called out-of-band from any thread. Returns whether this call
    /// ended the pass.
    pub fn notify_canceled(&self) -> bool {
        if self.transition(RUNNING, CANCELED) || self.transition(IDLE, CANCELED) {
            self.sink.emit(SyncEvent::Canceled);
            true
        } else {
            log::debug!("Ignoring late sync cancel");
            false
        }
    }

    /// Persist the last successful sync time
    ///
    /// Only writes after the pass finished; returns whether it wrote.
    pub fn record_last_sync_timestamp(&self, now_millis: i64) -> Result<bool> {
        if self.state.load(Ordering::Acquire) != FINISHED {
            return Ok(false);
        }
        self.settings.put_i64(KEY_LAST_SYNC_TIMESTAMP, now_millis)?;
        Ok(true)
    }

    /// End the pass, choosing finish or canceled from the flag's current state
    pub fn complete(&self, cancel: &CancellationFlag, result: &SyncResult) -> Result<PassOutcome> {
        if result.has_changes() {
            self.notify_changes();
        }

        if cancel.is_cancelled() {
            self.notify_canceled();
            return Ok(PassOutcome::Canceled);
        }

        if self.notify_finish() {
            self.record_last_sync_timestamp(chrono::Utc::now().timestamp_millis())?;
            Ok(PassOutcome::Finished)
        } else {
            // Canceled out-of-band after the walk ended
            Ok(PassOutcome::Canceled)
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state.load(Ordering::Acquire) == FINISHED
    }

    pub fn is_canceled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELED
    }
}
