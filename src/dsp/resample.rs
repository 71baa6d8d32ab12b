// fmrds
// Copyright (c) 2024 The fmrds Contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `resample` module implements [`LinearResampler`], the stereo stage's final rate conversion
//! from the MPX decimation rate to the configured audio output rate (§4.C). Unlike the front-end's
//! integer channel-select decimator, this conversion ratio is a real number (e.g. 256 kHz to
//! 48 kHz is 5.333...), so a fixed-step fractional cursor with linear interpolation is used rather
//! than a polyphase integer decimator — the same rational-rate-conversion idea the pack's
//! `sonido-analysis` resampler example implements with a full polyphase FIR, simplified here to
//! linear interpolation since the audio path has already been band-limited by the stereo matrix's
//! own low-pass filtering upstream.
pub struct LinearResampler {
    /// Output sample period in units of input samples, i.e. `input_rate / output_rate`.
    step: f64,
    /// Fractional read position into the pending buffer, always in `[0, 1)` once normalized by
    /// `process`.
    pos: f64,
    pending: Vec<f32>,
}

impl LinearResampler {
    pub fn new(input_rate_hz: f64, output_rate_hz: f64) -> Self {
        assert!(input_rate_hz > 0.0 && output_rate_hz > 0.0);
        Self { step: input_rate_hz / output_rate_hz, pos: 0.0, pending: Vec::new() }
    }

    pub fn reset(&mut self) {
        self.pos = 0.0;
        self.pending.clear();
    }

    /// Resample `input`, appending every output sample produced to `output`.
    pub fn process(&mut self, input: &[f32], output: &mut Vec<f32>) {
        self.pending.extend_from_slice(input);

        loop {
            let i0 = self.pos.floor() as usize;
            let i1 = i0 + 1;
            if i1 >= self.pending.len() {
                break;
            }

            let frac = (self.pos - self.pos.floor()) as f32;
            let y = self.pending[i0] * (1.0 - frac) + self.pending[i1] * frac;
            output.push(y);
            self.pos += self.step;
        }

        // Drop fully-consumed leading samples, keeping at least one sample of margin so `pos`'s
        // integer part can still address `i0` after rebasing. `pos`'s integer part never reaches
        // `pending.len()` here: the loop above only stops once `i0 + 1 >= pending.len()`.
        let consumed = (self.pos.floor() as usize).min(self.pending.len().saturating_sub(1));
        if consumed > 0 {
            self.pending.drain(..consumed);
            self.pos -= consumed as f64;
        }
    }
}
