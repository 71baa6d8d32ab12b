// fmrds
// Copyright (c) 2024 The fmrds Contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `block_sync` module implements the RDS block synchronizer FSM of §4.E: `Hunt` ->
//! `SyncCandidate` -> `Locked`, with Meggitt single-bit correction once locked and reversion to
//! `Hunt` after too many bad blocks within a trailing window of groups.

use log::{debug, info, warn};

use super::offsets::{check_and_correct, syndrome26, BlockCheck, Offset};

/// Bad (uncorrectable) blocks tolerated within a trailing window before reverting to `Hunt`.
const N_ERR: usize = 45;
/// Window size, in groups, over which `N_ERR` is evaluated. Four blocks per group.
const WINDOW_GROUPS: usize = 50;
const WINDOW_BLOCKS: usize = WINDOW_GROUPS * 4;

const ORDERED_OFFSETS: [Offset; 4] = [Offset::A, Offset::B, Offset::C, Offset::D];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    Hunt,
    /// `matched` counts how many of A, B, (C or C'), D have validated so far for this candidate.
    SyncCandidate { matched: u8, uses_c_prime: bool },
    Locked,
}

/// One fully-assembled, syndrome-passed RDS group: four 16-bit information words.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RdsGroup {
    pub blocks: [u16; 4],
    pub uses_c_prime: bool,
    /// How many of the four blocks required single-bit correction (0-4).
    pub corrected_blocks: u8,
}

/// Streaming RDS block/group synchronizer.
///
/// Consumes one differential-Manchester-decoded bit at a time via [`BlockSync::push_bit`] and
/// emits a [`RdsGroup`] whenever all four blocks of a group pass their syndrome check.
pub struct BlockSync {
    state: State,
    /// Rolling 26-bit window used while hunting (slides one bit at a time).
    hunt_reg: u32,
    hunt_bits: u32,
    /// Block-aligned accumulator used once a candidate has opened (fills to exactly 26 bits).
    block_reg: u32,
    block_bits: u32,
    pending: [u16; 4],
    pending_corrected: [bool; 4],
    /// Set once any block in the current (locked-mode) group is uncorrectable; the group is
    /// withheld at block D if this is set, per the "all four blocks pass syndrome check" rule.
    group_has_bad_block: bool,
    /// Block C's offset for the group currently being assembled, decided per group from block B's
    /// version bit (tried directly at block C's slot), not latched across groups.
    group_uses_c_prime: bool,
    bad_window: std::collections::VecDeque<bool>,
    bad_count_in_window: usize,
    /// Lifetime count of uncorrectable blocks, preserved across [`Self::reset`] so it can back a
    /// monotonic status counter (`PipelineStatus::rds_blocks_dropped`) even though the FSM state
    /// itself gets wiped whenever sync is lost.
    total_bad_blocks: u64,
}

impl BlockSync {
    pub fn new() -> Self {
        Self {
            state: State::Hunt,
            hunt_reg: 0,
            hunt_bits: 0,
            block_reg: 0,
            block_bits: 0,
            pending: [0; 4],
            pending_corrected: [false; 4],
            group_has_bad_block: false,
            group_uses_c_prime: false,
            bad_window: std::collections::VecDeque::with_capacity(WINDOW_BLOCKS),
            bad_count_in_window: 0,
            total_bad_blocks: 0,
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self.state, State::Locked)
    }

    pub fn total_bad_blocks(&self) -> u64 {
        self.total_bad_blocks
    }

    pub fn reset(&mut self) {
        let total_bad_blocks = self.total_bad_blocks;
        *self = Self::new();
        self.total_bad_blocks = total_bad_blocks;
    }

    /// Feed one recovered bit. Returns a completed group if this bit closed one out.
    pub fn push_bit(&mut self, bit: bool) -> Option<RdsGroup> {
        match self.state {
            State::Hunt => self.push_bit_hunt(bit),
            State::SyncCandidate { .. } => self.push_bit_candidate(bit),
            State::Locked => self.push_bit_locked(bit),
        }
    }

    fn push_bit_hunt(&mut self, bit: bool) -> Option<RdsGroup> {
        self.hunt_reg = ((self.hunt_reg << 1) | u32::from(bit)) & 0x3FF_FFFF;
        self.hunt_bits = (self.hunt_bits + 1).min(26);
        if self.hunt_bits < 26 {
            return None;
        }

        let expected_a = super::offsets::expected_syndrome(Offset::A);
        if syndrome26(self.hunt_reg) == expected_a {
            debug!("rds: candidate block A sync at hunt register {:#08x}", self.hunt_reg);
            self.pending[0] = (self.hunt_reg >> 10) as u16;
            self.pending_corrected = [false; 4];
            self.state = State::SyncCandidate { matched: 1, uses_c_prime: false };
            self.block_reg = 0;
            self.block_bits = 0;
        }
        None
    }

    fn push_bit_candidate(&mut self, bit: bool) -> Option<RdsGroup> {
        self.block_reg = ((self.block_reg << 1) | u32::from(bit)) & 0x3FF_FFFF;
        self.block_bits += 1;
        if self.block_bits < 26 {
            return None;
        }
        self.block_bits = 0;

        let (matched, uses_c_prime) = match self.state {
            State::SyncCandidate { matched, uses_c_prime } => (matched, uses_c_prime),
            _ => unreachable!(),
        };

        let (offset, slot, next_uses_c_prime) = match matched {
            1 => (Offset::B, 1, uses_c_prime),
            2 => {
                // Try O_C first, then O_C' — whichever gives an exact match decides the group's
                // version for the rest of this candidacy.
                if syndrome26(self.block_reg) == super::offsets::expected_syndrome(Offset::C) {
                    (Offset::C, 2, false)
                }
                else {
                    (Offset::CPrime, 2, true)
                }
            }
            3 => (Offset::D, 3, uses_c_prime),
            _ => unreachable!(),
        };

        if syndrome26(self.block_reg) == super::offsets::expected_syndrome(offset) {
            self.pending[slot] = (self.block_reg >> 10) as u16;
            let new_matched = matched + 1;
            if new_matched == 4 {
                info!("rds: block synchronizer LOCKED");
                self.state = State::Locked;
                return Some(RdsGroup {
                    blocks: self.pending,
                    uses_c_prime: next_uses_c_prime,
                    corrected_blocks: 0,
                });
            }
            self.state = State::SyncCandidate { matched: new_matched, uses_c_prime: next_uses_c_prime };
            None
        }
        else {
            debug!("rds: sync candidate rejected at block {}, reverting to HUNT", matched);
            self.state = State::Hunt;
            self.hunt_reg = 0;
            self.hunt_bits = 0;
            None
        }
    }

    fn push_bit_locked(&mut self, bit: bool) -> Option<RdsGroup> {
        let slot = (self.block_bits / 26) as usize % 4;
        self.block_reg = ((self.block_reg << 1) | u32::from(bit)) & 0x3FF_FFFF;
        self.block_bits += 1;
        if self.block_bits % 26 != 0 {
            return None;
        }

        if slot == 0 {
            self.group_has_bad_block = false;
        }

        // Block C's offset is O_C or O_C' per group, per block B's version bit — stations freely
        // interleave version-A and version-B groups, so this can't be latched across groups. Try
        // O_C first and fall back to O_C' only if it doesn't validate, same as the candidate path.
        let (check, info) = if slot == 2 {
            let c = check_and_correct(self.block_reg, Offset::C);
            if matches!(c.0, BlockCheck::Uncorrectable) {
                let c_prime = check_and_correct(self.block_reg, Offset::CPrime);
                self.group_uses_c_prime = !matches!(c_prime.0, BlockCheck::Uncorrectable);
                c_prime
            }
            else {
                self.group_uses_c_prime = false;
                c
            }
        }
        else {
            check_and_correct(self.block_reg, ORDERED_OFFSETS[slot])
        };
        self.block_reg = 0;

        let ok = !matches!(check, BlockCheck::Uncorrectable);
        self.record_block_result(!ok);
        self.pending[slot] = info;
        self.pending_corrected[slot] = matches!(check, BlockCheck::Corrected { .. });
        self.group_has_bad_block |= !ok;

        if !ok {
            warn!("rds: uncorrectable block at slot {}, group invalidated", slot);
        }

        if slot != 3 {
            return None;
        }

        if self.bad_count_in_window > N_ERR {
            warn!("rds: {} bad blocks in trailing window, reverting to HUNT", self.bad_count_in_window);
            self.reset();
            return None;
        }

        if self.group_has_bad_block {
            None
        }
        else {
            Some(RdsGroup {
                blocks: self.pending,
                uses_c_prime: self.group_uses_c_prime,
                corrected_blocks: self.pending_corrected.iter().filter(|&&c| c).count() as u8,
            })
        }
    }

    fn record_block_result(&mut self, bad: bool) {
        self.bad_window.push_back(bad);
        if bad {
            self.bad_count_in_window += 1;
            self.total_bad_blocks += 1;
        }
        if self.bad_window.len() > WINDOW_BLOCKS {
            if self.bad_window.pop_front() == Some(true) {
                self.bad_count_in_window -= 1;
            }
        }
    }
}

impl Default for BlockSync {
    fn default() -> Self {
        Self::new()
    }
}
