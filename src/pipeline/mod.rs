// fmrds
// Copyright (c) 2024 The fmrds Contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `pipeline` module wires the stages of §4 together into [`Pipeline`], the sequential
//! stage-A-through-E state machine, and [`Worker`], the bounded-queue-driven background thread of
//! §5 that owns one and drives it from submitted `C8` blocks.

pub mod fm_demod;
pub mod front_end;
pub mod rds_phy;
pub mod stereo;

pub use fm_demod::FmDemod;
pub use front_end::FrontEnd;
pub use rds_phy::RdsPhy;
pub use stereo::Stereo;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::observer::{AudioSink, ChangeNotifier, InputQueue, RdsSignalObserver};
use crate::rds::{decode_group, StationDatabase};
use crate::sample::C8;
use crate::status::{PipelineStatus, StatusFlags};

/// The sequential DSP + RDS state machine of §3/§4: owns every stage's persistent state (PLL
/// phase, FIR delay lines, the RDS sync FSM) and processes input blocks strictly in order, never
/// overlapping two blocks, per §5's scheduling model.
///
/// `Pipeline` itself does no threading; it is driven one block at a time by whichever caller holds
/// it. [`Worker`] is the thread-owning wrapper that reads from a bounded [`InputQueue`] and drives
/// a `Pipeline` on a dedicated thread, matching §5's producer/consumer description directly.
pub struct Pipeline {
    config: PipelineConfig,
    front_end: FrontEnd,
    fm_demod: FmDemod,
    stereo: Stereo,
    rds_phy: RdsPhy,
    database: Arc<StationDatabase>,
    notifier: ChangeNotifier,
    status: Arc<PipelineStatus>,
    mpx: Vec<f32>,
    bad_blocks_reported: u64,
}

impl Pipeline {
    /// The only fallible entry point in the crate (§6): everything past construction degrades
    /// through [`PipelineStatus`] rather than returning an error.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;

        let alignment = config.channel_decimation() as usize;
        let channel_rate_hz = config.channel_rate_hz() as f32;

        Ok(Self {
            front_end: FrontEnd::new(alignment),
            fm_demod: FmDemod::new(
                config.input_sample_rate_hz,
                config.channel_decimation(),
                config.fm_deviation_hz,
                config.deemphasis_us,
            ),
            stereo: Stereo::new(channel_rate_hz, config.audio_sample_rate_hz),
            rds_phy: RdsPhy::new(channel_rate_hz),
            database: Arc::new(StationDatabase::new()),
            notifier: ChangeNotifier::new(),
            status: Arc::new(PipelineStatus::new()),
            mpx: Vec::new(),
            bad_blocks_reported: 0,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// A cheaply-cloneable handle to the station database (§4.E's "observable surface").
    pub fn database(&self) -> Arc<StationDatabase> {
        Arc::clone(&self.database)
    }

    /// A cheaply-cloneable handle to the pipeline's health counters and flags (§7/§8).
    pub fn status(&self) -> Arc<PipelineStatus> {
        Arc::clone(&self.status)
    }

    /// A new handle onto the same change-notification queue the database publishes to.
    pub fn change_notifier(&self) -> ChangeNotifier {
        self.notifier.handle()
    }

    /// Drive stages A through E over one input block, invoking `audio_sink` and (if enabled)
    /// `rds_observer` synchronously with borrowed views, per §6's callback contract. Database
    /// change events are published to the change-notification queue rather than returned
    /// directly; the ordering guarantee of §5 (RDS-signal snapshot, then audio frame, then
    /// database change events) holds because the RDS-signal callback and audio callback below run
    /// before the database is ever mutated.
    pub fn process_block(
        &mut self,
        block: &[C8],
        audio_sink: &mut dyn AudioSink,
        rds_observer: Option<&mut dyn RdsSignalObserver>,
    ) {
        let mpx_input = self.front_end.submit(block);
        if mpx_input.is_empty() {
            self.status.record_block_processed();
            return;
        }

        self.mpx.clear();
        self.fm_demod.process(&mpx_input, &mut self.mpx);

        let (frames, harmonics) = self.stereo.process(&self.mpx);
        let (groups, rds_signal) = self.rds_phy.process(&self.mpx, &harmonics);

        if self.config.output_rds_signal {
            if let Some(observer) = rds_observer {
                observer.on_rds_signal(&rds_signal);
            }
        }

        audio_sink.on_audio_block(&frames, self.config.audio_sample_rate_hz);

        for group in &groups {
            let decoded = decode_group(group);
            self.database.apply_group(&decoded, &self.notifier);
            if group.corrected_blocks > 0 {
                self.status.record_rds_blocks_corrected(group.corrected_blocks.into());
            }
        }

        let total_bad_blocks = self.rds_phy.total_bad_blocks();
        let newly_dropped = total_bad_blocks - self.bad_blocks_reported;
        if newly_dropped > 0 {
            self.status.record_rds_blocks_dropped(newly_dropped);
            self.bad_blocks_reported = total_bad_blocks;
        }

        self.status.set_flag(StatusFlags::PILOT_LOCKED, self.stereo.locked());
        self.status.set_flag(StatusFlags::RDS_SYMBOL_LOCK, self.rds_phy.symbol_locked());
        self.status.set_flag(StatusFlags::RDS_GROUP_SYNC, self.rds_phy.group_synced());
        self.status.record_block_processed();
    }

    pub fn reset(&mut self) {
        self.front_end.reset();
        self.fm_demod.reset();
        self.stereo.reset();
        self.rds_phy.reset();
    }
}

/// Drives a [`Pipeline`] on a dedicated background thread, pulling `C8` blocks from a bounded
/// [`InputQueue`] and invoking the configured observers for each, per §5. Submission to the queue
/// is the caller's responsibility (see [`InputQueue::try_submit`]); the worker only consumes.
pub struct Worker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<Pipeline>>,
}

impl Worker {
    /// Spawn the worker thread. `audio_sink` and `rds_observer` are moved onto the worker thread
    /// and invoked there for the lifetime of the worker.
    pub fn spawn(
        mut pipeline: Pipeline,
        input: InputQueue,
        mut audio_sink: Box<dyn AudioSink + Send>,
        mut rds_observer: Option<Box<dyn RdsSignalObserver + Send>>,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = Arc::clone(&stop);

        let handle = std::thread::Builder::new()
            .name("fmrds-pipeline".into())
            .spawn(move || {
                while !stop_for_thread.load(Ordering::Acquire) {
                    match input.try_take() {
                        Some(block) => {
                            pipeline.process_block(&block, &mut *audio_sink, rds_observer.as_deref_mut());
                        }
                        // The only suspension point (§5): back off briefly rather than busy-spin
                        // while waiting for the next block.
                        None => std::thread::sleep(std::time::Duration::from_millis(1)),
                    }
                }
                // Cooperative stop (§5): drain whatever is already queued before exiting so no
                // submitted block is silently discarded.
                while let Some(block) = input.try_take() {
                    pipeline.process_block(&block, &mut *audio_sink, rds_observer.as_deref_mut());
                }
                pipeline
            })
            .expect("failed to spawn pipeline worker thread");

        Self { stop, handle: Some(handle) }
    }

    /// Request the worker to stop after draining its queue, and block until it does, returning the
    /// pipeline so its accumulated state (station database aside, which is independently `Arc`-
    /// shared) can be inspected or reused.
    pub fn join(mut self) -> Pipeline {
        self.stop.store(true, Ordering::Release);
        self.handle.take().expect("worker already joined").join().expect("pipeline worker panicked")
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
