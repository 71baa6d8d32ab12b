// fmrds
// Copyright (c) 2024 The fmrds Contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `observer` module defines the pipeline's collaborator interfaces (§5/§6): the audio
//! output and optional RDS-signal callbacks the worker thread invokes synchronously with borrowed
//! views, and the lock-free queues used for input backpressure and station-database change
//! notification.

use std::sync::Arc;

use crossbeam::queue::ArrayQueue;

use crate::sample::{Frame, C8};

/// Receives decoded audio, one block at a time.
///
/// `frames` is a borrowed view valid only for the duration of the call; implementors that need to
/// retain the data must copy it.
pub trait AudioSink {
    fn on_audio_block(&mut self, frames: &[Frame], sample_rate_hz: u32);
}

/// Receives the post-matched-filter RDS symbol stream, for UI/visualization use only.
///
/// Disabled by default; see [`crate::config::PipelineConfig::output_rds_signal`].
pub trait RdsSignalObserver {
    fn on_rds_signal(&mut self, samples: &[f32]);
}

/// A station-database mutation the worker just committed, delivered after the audio callback for
/// the block in which it occurred.
#[derive(Clone, Debug, PartialEq)]
pub enum ChangeEvent {
    /// A previously-unseen PI code was added to the database.
    StationAdded { pi: u16 },
    /// The program service name for `pi` changed.
    PsUpdated { pi: u16 },
    /// The radiotext buffer for `pi` changed (including an A/B toggle clear).
    RadiotextUpdated { pi: u16 },
    /// The alternate-frequency set for `pi` changed.
    AfUpdated { pi: u16 },
    /// A 4A group decoded a new clock-time for `pi`.
    ClockTimeUpdated { pi: u16 },
    /// A 3A group registered a new Open Data Application for `pi`.
    OdaRegistered { pi: u16, aid: u16, group_type: u8 },
}

/// Depth of the lock-free SPMC change-notification queue. Generous relative to the rate at which
/// group commits occur (at most one per 104 RDS bits, i.e. well under 12 Hz) so a slow consumer
/// can fall behind a full RDS group cycle without the writer blocking.
const CHANGE_QUEUE_DEPTH: usize = 256;

/// A lock-free, single-writer/multi-reader notification channel for [`ChangeEvent`]s.
///
/// Backed by `crossbeam`'s `ArrayQueue`: the worker thread is the sole producer, any number of
/// observer threads may drain it via [`ChangeNotifier::try_recv`]. Once an event is popped by one
/// reader it is gone — this is a shared work queue, not a fan-out broadcast — which matches how
/// the pipeline itself consumes it today (a single database-change listener).
pub struct ChangeNotifier {
    queue: Arc<ArrayQueue<ChangeEvent>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self { queue: Arc::new(ArrayQueue::new(CHANGE_QUEUE_DEPTH)) }
    }

    /// A cheaply-cloneable handle sharing the same underlying queue.
    pub fn handle(&self) -> Self {
        Self { queue: Arc::clone(&self.queue) }
    }

    /// Publish an event. If the queue is full, the oldest unread event is dropped to make room
    /// rather than blocking the worker thread.
    pub(crate) fn publish(&self, event: ChangeEvent) {
        if self.queue.push(event.clone()).is_err() {
            let _ = self.queue.pop();
            let _ = self.queue.push(event);
        }
    }

    /// Pop the next pending event, if any.
    pub fn try_recv(&self) -> Option<ChangeEvent> {
        self.queue.pop()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded input queue used for the `C8` block handoff between the submitting thread and the
/// pipeline's worker thread (§5: "bounded input queue of depth >= 2").
pub struct InputQueue {
    queue: Arc<ArrayQueue<Vec<C8>>>,
}

impl InputQueue {
    pub fn new(depth: usize) -> Self {
        assert!(depth >= 2, "input queue depth must be at least 2");
        Self { queue: Arc::new(ArrayQueue::new(depth)) }
    }

    pub fn handle(&self) -> Self {
        Self { queue: Arc::clone(&self.queue) }
    }

    /// Attempt to submit a block. Returns the block back to the caller if the queue is full,
    /// giving the submitter (rather than this queue) the choice of how to apply backpressure —
    /// spin, block on a condvar, or drop.
    pub fn try_submit(&self, block: Vec<C8>) -> Result<(), Vec<C8>> {
        self.queue.push(block)
    }

    pub fn try_take(&self) -> Option<Vec<C8>> {
        self.queue.pop()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
