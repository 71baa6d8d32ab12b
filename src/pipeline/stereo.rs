// fmrds
// Copyright (c) 2024 The fmrds Contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `stereo` module implements §4.C: pilot recovery and phase-locking, the L+R / L-R stereo
//! matrix, and the final resample to the configured audio rate. It also drives the shared pilot
//! PLL, so it hands the per-sample [`PilotHarmonics`] stream back to the caller for the RDS
//! physical layer (§4.D) to reuse the 57 kHz reference rather than running a second PLL.

use std::f32::consts::PI;

use log::info;

use crate::dsp::fir::{bandpass_taps, lowpass_taps, Fir};
use crate::dsp::goertzel::Goertzel;
use crate::dsp::pll::{PilotHarmonics, PilotPll};
use crate::dsp::resample::LinearResampler;
use crate::sample::Frame;

const PILOT_HZ: f32 = 19_000.0;
const PILOT_BANDPASS_HALF_WIDTH_HZ: f32 = 2_000.0;
const PILOT_BANDPASS_TAPS: usize = 127;
const PILOT_LOOP_BANDWIDTH_HZ: f32 = 5.0;
const AUDIO_LOWPASS_CUTOFF_HZ: f32 = 15_000.0;
const AUDIO_LOWPASS_TAPS: usize = 127;
/// Block size for the pilot-amplitude Goertzel monitor; arbitrary relative to the ~19 kHz tone but
/// large enough to average over many cycles at typical channel rates.
const GOERTZEL_BLOCK: usize = 512;

pub struct Stereo {
    pilot_bandpass: Fir,
    pll: PilotPll,
    goertzel: Goertzel,
    pilot_magnitude: f32,
    lpr: Fir,
    lmr: Fir,
    left_resampler: LinearResampler,
    right_resampler: LinearResampler,
    was_locked: bool,
}

impl Stereo {
    pub fn new(channel_rate_hz: f32, audio_sample_rate_hz: u32) -> Self {
        let pilot_bandpass_taps =
            bandpass_taps(PILOT_HZ, PILOT_BANDPASS_HALF_WIDTH_HZ, channel_rate_hz, PILOT_BANDPASS_TAPS);
        let audio_taps = lowpass_taps(AUDIO_LOWPASS_CUTOFF_HZ, channel_rate_hz, AUDIO_LOWPASS_TAPS);

        Self {
            pilot_bandpass: Fir::new(pilot_bandpass_taps),
            pll: PilotPll::new(PILOT_HZ, channel_rate_hz, PILOT_LOOP_BANDWIDTH_HZ),
            goertzel: Goertzel::new(PILOT_HZ, channel_rate_hz, GOERTZEL_BLOCK),
            pilot_magnitude: 0.0,
            lpr: Fir::new(audio_taps.clone()),
            lmr: Fir::new(audio_taps),
            left_resampler: LinearResampler::new(f64::from(channel_rate_hz), f64::from(audio_sample_rate_hz)),
            right_resampler: LinearResampler::new(f64::from(channel_rate_hz), f64::from(audio_sample_rate_hz)),
            was_locked: false,
        }
    }

    pub fn reset(&mut self) {
        self.pilot_bandpass.reset();
        self.pll.reset();
        self.goertzel.reset();
        self.pilot_magnitude = 0.0;
        self.lpr.reset();
        self.lmr.reset();
        self.left_resampler.reset();
        self.right_resampler.reset();
        self.was_locked = false;
    }

    pub fn locked(&self) -> bool {
        self.pll.locked()
    }

    /// The pilot tone's Goertzel-estimated amplitude over the most recently completed monitoring
    /// block; informational only, not part of the stereo/mono decision (see §4.C, which keys that
    /// decision strictly off PLL lock).
    pub fn pilot_magnitude(&self) -> f32 {
        self.pilot_magnitude
    }

    /// Process one block of MPX samples. Returns the decoded audio frames at the configured audio
    /// rate, and the per-input-sample pilot harmonics so the RDS stage can reuse the same
    /// phase-locked 57 kHz reference.
    pub fn process(&mut self, mpx: &[f32]) -> (Vec<Frame>, Vec<PilotHarmonics>) {
        let mut harmonics = Vec::with_capacity(mpx.len());
        let mut lpr_samples = Vec::with_capacity(mpx.len());
        let mut lmr_samples = Vec::with_capacity(mpx.len());

        for &x in mpx {
            let pilot_bp = self.pilot_bandpass.push(x);
            if let Some(mag) = self.goertzel.push(pilot_bp) {
                self.pilot_magnitude = mag;
            }

            let h = self.pll.process(pilot_bp);

            let sum = self.lpr.push(x);
            // Synchronous demodulation of the L-R DSB-SC subcarrier: multiplying by the locked
            // 38 kHz reference and low-pass filtering halves the recovered amplitude, so it's
            // doubled back here.
            let diff_raw = x * h.f2.re * 2.0;
            let diff = self.lmr.push(diff_raw);

            lpr_samples.push(sum);
            lmr_samples.push(diff);
            harmonics.push(h);
        }

        let mut left_mix = Vec::with_capacity(mpx.len());
        let mut right_mix = Vec::with_capacity(mpx.len());
        let locked = self.locked();
        if locked != self.was_locked {
            if locked {
                info!("stereo: pilot PLL locked, switching to stereo matrix");
            }
            else {
                info!("stereo: pilot PLL lock lost, falling back to mono");
            }
            self.was_locked = locked;
        }
        for (sum, diff) in lpr_samples.iter().zip(lmr_samples.iter()) {
            if locked {
                left_mix.push((sum + diff) / 2.0);
                right_mix.push((sum - diff) / 2.0);
            }
            else {
                left_mix.push(sum / 2.0);
                right_mix.push(sum / 2.0);
            }
        }

        let mut left_audio = Vec::new();
        let mut right_audio = Vec::new();
        self.left_resampler.process(&left_mix, &mut left_audio);
        self.right_resampler.process(&right_mix, &mut right_audio);

        let n = left_audio.len().min(right_audio.len());
        let frames = (0..n).map(|i| Frame::new(left_audio[i], right_audio[i])).collect();

        (frames, harmonics)
    }
}
