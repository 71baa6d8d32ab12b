// fmrds
// Copyright (c) 2024 The fmrds Contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `nco` module implements a numerically-controlled oscillator: a phase accumulator that is
//! always kept wrapped to `[-pi, pi]`, per the phase-wrap invariant of §3.

use std::f32::consts::PI;

use super::complex::Complex;

/// Wrap an angle in radians to `[-pi, pi]`.
#[inline]
pub fn wrap_phase(mut phase: f32) -> f32 {
    const TWO_PI: f32 = 2.0 * PI;
    phase %= TWO_PI;
    if phase > PI {
        phase -= TWO_PI;
    }
    else if phase < -PI {
        phase += TWO_PI;
    }
    phase
}

/// A numerically-controlled oscillator.
pub struct Nco {
    phase: f32,
    /// Phase increment per sample, in radians.
    freq: f32,
    sample_rate_hz: f32,
}

impl Nco {
    pub fn new(initial_freq_hz: f32, sample_rate_hz: f32) -> Self {
        let mut nco = Self { phase: 0.0, freq: 0.0, sample_rate_hz };
        nco.set_frequency_hz(initial_freq_hz);
        nco
    }

    pub fn reset_phase(&mut self) {
        self.phase = 0.0;
    }

    pub fn set_frequency_hz(&mut self, freq_hz: f32) {
        self.freq = 2.0 * PI * freq_hz / self.sample_rate_hz;
    }

    pub fn frequency_hz(&self) -> f32 {
        self.freq * self.sample_rate_hz / (2.0 * PI)
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Advance the oscillator by one sample and return its current complex value before
    /// advancing.
    #[inline]
    pub fn step(&mut self) -> Complex {
        let out = Complex::from_polar(1.0, self.phase);
        self.phase = wrap_phase(self.phase + self.freq);
        out
    }
}
