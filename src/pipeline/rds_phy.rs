// fmrds
// Copyright (c) 2024 The fmrds Contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `rds_phy` module implements §4.D: 57 kHz bandpass isolation, carrier downconversion against
//! the pilot-derived 57 kHz reference, root-raised-cosine matched filtering, Gardner symbol timing
//! recovery, hard-decision slicing, and differential Manchester decode, feeding the recovered bit
//! stream into the link layer's block synchronizer (§4.E).

use crate::dsp::fir::{bandpass_taps, Fir, PolyphaseDecimator};
use crate::dsp::gardner::GardnerTimingRecovery;
use crate::dsp::pll::PilotHarmonics;
use crate::dsp::rrc::rrc_taps;
use crate::dsp::Complex;
use crate::rds::{BlockSync, RdsGroup};

const RDS_SUBCARRIER_HZ: f32 = 57_000.0;
const RDS_BANDPASS_HALF_WIDTH_HZ: f32 = 3_000.0;
const RDS_BANDPASS_TAPS: usize = 127;
const RDS_SYMBOL_RATE_HZ: f32 = 1187.5;
const RRC_ROLLOFF: f32 = 1.0;
const RRC_SPAN_SYMBOLS: usize = 8;
const GARDNER_LOOP_BANDWIDTH_FRACTION: f32 = 0.01;

pub struct RdsPhy {
    bandpass: Fir,
    matched: PolyphaseDecimator,
    gardner: GardnerTimingRecovery,
    block_sync: BlockSync,
    prev_symbol_bit: bool,
}

impl RdsPhy {
    pub fn new(channel_rate_hz: f32) -> Self {
        let bandpass_taps_vec =
            bandpass_taps(RDS_SUBCARRIER_HZ, RDS_BANDPASS_HALF_WIDTH_HZ, channel_rate_hz, RDS_BANDPASS_TAPS);
        let matched_taps = rrc_taps(RRC_ROLLOFF, RDS_SYMBOL_RATE_HZ, channel_rate_hz, RRC_SPAN_SYMBOLS);

        Self {
            bandpass: Fir::new(bandpass_taps_vec),
            matched: PolyphaseDecimator::new(&matched_taps, 1),
            gardner: GardnerTimingRecovery::new(
                RDS_SYMBOL_RATE_HZ,
                channel_rate_hz,
                GARDNER_LOOP_BANDWIDTH_FRACTION,
            ),
            block_sync: BlockSync::new(),
            prev_symbol_bit: false,
        }
    }

    pub fn reset(&mut self) {
        self.bandpass.reset();
        self.matched.reset();
        self.gardner.reset();
        self.block_sync.reset();
        self.prev_symbol_bit = false;
    }

    pub fn symbol_locked(&self) -> bool {
        self.gardner.locked()
    }

    pub fn group_synced(&self) -> bool {
        self.block_sync.is_locked()
    }

    pub fn total_bad_blocks(&self) -> u64 {
        self.block_sync.total_bad_blocks()
    }

    /// Process one block of MPX samples and their pilot harmonics (as produced alongside it by
    /// [`crate::pipeline::stereo::Stereo::process`]), returning every RDS group the block
    /// synchronizer emitted and the post-matched-filter real symbol stream (for the optional RDS
    /// signal observer, §6).
    pub fn process(&mut self, mpx: &[f32], harmonics: &[PilotHarmonics]) -> (Vec<RdsGroup>, Vec<f32>) {
        assert_eq!(mpx.len(), harmonics.len());

        let mut baseband = Vec::with_capacity(mpx.len());
        for (&x, h) in mpx.iter().zip(harmonics.iter()) {
            let bandpassed = self.bandpass.push(x);
            baseband.push(Complex::new(bandpassed, 0.0) * h.f3.conj());
        }

        let mut matched_out = Vec::new();
        self.matched.process(&baseband, &mut matched_out);
        let rds_signal: Vec<f32> = matched_out.iter().map(|c| c.re).collect();

        let mut groups = Vec::new();
        for symbol in self.gardner.process(&matched_out) {
            let bit = symbol.sample.re > 0.0;
            let decoded = bit ^ self.prev_symbol_bit;
            self.prev_symbol_bit = bit;
            if let Some(group) = self.block_sync.push_bit(decoded) {
                groups.push(group);
            }
        }

        (groups, rds_signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::nco::Nco;

    fn pilot_harmonics_stream(n: usize, pilot_hz: f32, sample_rate_hz: f32) -> Vec<PilotHarmonics> {
        let mut nco = Nco::new(pilot_hz, sample_rate_hz);
        (0..n)
            .map(|_| {
                let f1 = nco.step();
                let f2 = f1 * f1;
                let f4 = f2 * f2;
                let f3 = f4 * f1.conj();
                PilotHarmonics { f1, f2, f3, f4 }
            })
            .collect()
    }

    #[test]
    fn produces_no_groups_on_silence() {
        let channel_rate = 256_000.0;
        let mut rds = RdsPhy::new(channel_rate);
        let mpx = vec![0.0f32; 20_000];
        let harmonics = pilot_harmonics_stream(mpx.len(), 19_000.0, channel_rate);
        let (groups, signal) = rds.process(&mpx, &harmonics);
        assert!(groups.is_empty());
        assert_eq!(signal.len(), mpx.len());
    }

    #[test]
    fn can_be_called_incrementally_without_panicking() {
        let channel_rate = 256_000.0;
        let mut rds = RdsPhy::new(channel_rate);
        let harmonics_all = pilot_harmonics_stream(10_000, 19_000.0, channel_rate);
        let mpx: Vec<f32> = (0..10_000)
            .map(|i| (2.0 * std::f32::consts::PI * 57_000.0 * i as f32 / channel_rate).sin() * 0.05)
            .collect();

        let mut offset = 0;
        for chunk_len in [500, 1500, 3000, 5000] {
            let end = (offset + chunk_len).min(mpx.len());
            let (groups, _) = rds.process(&mpx[offset..end], &harmonics_all[offset..end]);
            let _ = groups;
            offset = end;
        }
    }

    #[test]
    fn starts_unsynced() {
        let rds = RdsPhy::new(256_000.0);
        assert!(!rds.group_synced());
        assert!(!rds.symbol_locked());
    }

    #[test]
    fn reset_reverts_to_unsynced() {
        let channel_rate = 256_000.0;
        let mut rds = RdsPhy::new(channel_rate);
        let mpx: Vec<f32> = (0..5000)
            .map(|i| (2.0 * std::f32::consts::PI * 57_000.0 * i as f32 / channel_rate).sin() * 0.05)
            .collect();
        let harmonics = pilot_harmonics_stream(mpx.len(), 19_000.0, channel_rate);
        rds.process(&mpx, &harmonics);
        rds.reset();
        assert!(!rds.group_synced());
    }
}
