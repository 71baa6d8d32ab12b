// fmrds
// Copyright (c) 2024 The fmrds Contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `goertzel` module implements a single-bin streaming DFT, used alongside the pilot PLL
//! (§4.C) as an amplitude/SNR estimator that feeds the PLL's lock hysteresis. It is a narrowband
//! alternative to a full FFT when only one frequency bin's power is needed.

/// A streaming single-bin Goertzel power detector.
///
/// Samples are fed one block at a time via [`Goertzel::push_block`]; [`Goertzel::magnitude`]
/// returns the bin's magnitude for the block just completed and resets the internal state for the
/// next block.
pub struct Goertzel {
    coeff: f32,
    s_prev: f32,
    s_prev2: f32,
    block_size: usize,
    count: usize,
}

impl Goertzel {
    /// Build a detector for `target_hz` at `sample_rate_hz`, evaluated over blocks of
    /// `block_size` samples.
    pub fn new(target_hz: f32, sample_rate_hz: f32, block_size: usize) -> Self {
        assert!(block_size > 0);
        let k = (block_size as f32 * target_hz / sample_rate_hz).round();
        let omega = 2.0 * std::f32::consts::PI * k / block_size as f32;
        Self { coeff: 2.0 * omega.cos(), s_prev: 0.0, s_prev2: 0.0, block_size, count: 0 }
    }

    pub fn reset(&mut self) {
        self.s_prev = 0.0;
        self.s_prev2 = 0.0;
        self.count = 0;
    }

    /// Feed one sample. Returns `Some(magnitude)` when a full block has been accumulated (at
    /// which point the state resets for the next block), `None` otherwise.
    #[inline]
    pub fn push(&mut self, x: f32) -> Option<f32> {
        let s = x + self.coeff * self.s_prev - self.s_prev2;
        self.s_prev2 = self.s_prev;
        self.s_prev = s;
        self.count += 1;

        if self.count == self.block_size {
            let power = self.s_prev2 * self.s_prev2 + self.s_prev * self.s_prev
                - self.coeff * self.s_prev * self.s_prev2;
            self.reset();
            Some(power.max(0.0).sqrt())
        }
        else {
            None
        }
    }

    /// Feed a full block of exactly `block_size` samples and return the bin magnitude.
    pub fn push_block(&mut self, samples: &[f32]) -> f32 {
        assert_eq!(samples.len(), self.block_size);
        let mut last = None;
        for &x in samples {
            last = self.push(x);
        }
        last.expect("push_block processes exactly one block")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_tone_at_target_frequency() {
        let sample_rate = 256_000.0;
        let block = 256;
        let mut g = Goertzel::new(19_000.0, sample_rate, block);
        let samples: Vec<f32> = (0..block)
            .map(|i| (2.0 * std::f32::consts::PI * 19_000.0 * i as f32 / sample_rate).sin())
            .collect();
        let mag = g.push_block(&samples);
        assert!(mag > 50.0, "mag={}", mag);
    }

    #[test]
    fn rejects_tone_far_from_target() {
        let sample_rate = 256_000.0;
        let block = 256;
        let mut g = Goertzel::new(19_000.0, sample_rate, block);
        let samples: Vec<f32> = (0..block)
            .map(|i| (2.0 * std::f32::consts::PI * 60_000.0 * i as f32 / sample_rate).sin())
            .collect();
        let mag = g.push_block(&samples);
        assert!(mag < 20.0, "mag={}", mag);
    }

    #[test]
    fn silence_yields_near_zero_magnitude() {
        let mut g = Goertzel::new(19_000.0, 256_000.0, 128);
        let mag = g.push_block(&vec![0.0f32; 128]);
        assert!(mag < 1e-3);
    }
}
