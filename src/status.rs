// fmrds
// Copyright (c) 2024 The fmrds Contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `status` module defines [`PipelineStatus`], the three counters and three flags of §7/§8:
//! the only state a caller can observe about the pipeline's health without going through the
//! audio/RDS-signal/database observer surfaces. The worker thread is the sole writer; readers
//! take an atomic snapshot at any time, never blocking the worker.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use bitflags::bitflags;

bitflags! {
    /// The pipeline's three boolean health flags, packed so a snapshot is one atomic load.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct StatusFlags: u32 {
        /// The stereo pilot PLL is locked.
        const PILOT_LOCKED    = 1 << 0;
        /// The Gardner timing loop has a stable RDS symbol clock.
        const RDS_SYMBOL_LOCK = 1 << 1;
        /// The RDS block synchronizer FSM is in `LOCKED`.
        const RDS_GROUP_SYNC  = 1 << 2;
    }
}

/// A point-in-time copy of the pipeline's counters and flags.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub blocks_processed: u64,
    pub rds_blocks_corrected: u64,
    pub rds_blocks_dropped: u64,
    pub flags: StatusFlags,
}

impl StatusSnapshot {
    pub fn pilot_locked(&self) -> bool {
        self.flags.contains(StatusFlags::PILOT_LOCKED)
    }

    pub fn rds_symbol_locked(&self) -> bool {
        self.flags.contains(StatusFlags::RDS_SYMBOL_LOCK)
    }

    pub fn rds_group_sync(&self) -> bool {
        self.flags.contains(StatusFlags::RDS_GROUP_SYNC)
    }
}

/// The pipeline's shared status: written only by the worker thread, readable lock-free from any
/// number of other threads via [`PipelineStatus::snapshot`].
#[derive(Default)]
pub struct PipelineStatus {
    blocks_processed: AtomicU64,
    rds_blocks_corrected: AtomicU64,
    rds_blocks_dropped: AtomicU64,
    flags: AtomicU32,
}

impl PipelineStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            blocks_processed: self.blocks_processed.load(Ordering::Relaxed),
            rds_blocks_corrected: self.rds_blocks_corrected.load(Ordering::Relaxed),
            rds_blocks_dropped: self.rds_blocks_dropped.load(Ordering::Relaxed),
            flags: StatusFlags::from_bits_truncate(self.flags.load(Ordering::Relaxed)),
        }
    }

    pub(crate) fn record_block_processed(&self) {
        self.blocks_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rds_blocks_corrected(&self, count: u64) {
        self.rds_blocks_corrected.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_rds_blocks_dropped(&self, count: u64) {
        self.rds_blocks_dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn set_flag(&self, flag: StatusFlags, value: bool) {
        let mut bits = self.flags.load(Ordering::Relaxed);
        let mut new_bits = StatusFlags::from_bits_truncate(bits);
        new_bits.set(flag, value);
        bits = new_bits.bits();
        self.flags.store(bits, Ordering::Relaxed);
    }
}
