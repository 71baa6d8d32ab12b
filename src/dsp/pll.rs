// fmrds
// Copyright (c) 2024 The fmrds Contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `pll` module implements the software phase-locked loop that tracks the 19 kHz stereo
//! pilot and derives the 38 kHz, 57 kHz, and 76 kHz references from it (§4.C, §4.D).
//!
//! The loop is a standard analog-style PLL for tracking a real sinusoid: the incoming
//! (bandpass-filtered) pilot sample is multiplied against the NCO's in-phase and quadrature
//! outputs to form a phase-error term, which a proportional-integral loop filter feeds back into
//! the NCO's instantaneous frequency. Harmonics are derived from the locked fundamental by
//! repeated complex multiplication rather than independent oscillators, so they stay exactly
//! phase-coherent with the tracked pilot.

use super::complex::Complex;
use super::nco::Nco;

/// Harmonics of the tracked pilot, phase-coherent by construction.
#[derive(Copy, Clone, Debug)]
pub struct PilotHarmonics {
    /// 19 kHz fundamental.
    pub f1: Complex,
    /// 38 kHz, used for synchronous L-R demodulation.
    pub f2: Complex,
    /// 57 kHz, the RDS subcarrier reference (3x pilot).
    pub f3: Complex,
    /// 76 kHz (4x pilot), an intermediate used to derive `f3`.
    pub f4: Complex,
}

/// A software PLL that tracks the 19 kHz pilot tone.
pub struct PilotPll {
    nco: Nco,
    sample_rate_hz: f32,
    /// Proportional loop filter gain.
    kp: f32,
    /// Integral loop filter gain.
    ki: f32,
    /// Accumulated frequency trim from the integral path, in Hz.
    freq_trim_hz: f32,
    base_freq_hz: f32,
    /// Low-pass filtered |phase error|, used for the lock decision.
    error_lpf: f32,
    error_lpf_alpha: f32,
    locked: bool,
    lock_threshold: f32,
    unlock_threshold: f32,
}

impl PilotPll {
    /// `loop_bandwidth_hz` controls how aggressively the loop filter corrects frequency error;
    /// a few Hz is typical for a 19 kHz pilot with a clean stereo signal.
    pub fn new(pilot_hz: f32, sample_rate_hz: f32, loop_bandwidth_hz: f32) -> Self {
        // Critically damped second-order loop coefficients, parameterized directly by the
        // requested loop bandwidth rather than a damping-factor/natural-frequency pair, to keep
        // the public surface to a single tunable.
        let wn = 2.0 * std::f32::consts::PI * loop_bandwidth_hz;
        let kp = 1.414 * wn;
        let ki = wn * wn;

        Self {
            nco: Nco::new(pilot_hz, sample_rate_hz),
            sample_rate_hz,
            kp,
            ki,
            freq_trim_hz: 0.0,
            base_freq_hz: pilot_hz,
            error_lpf: 1.0,
            error_lpf_alpha: 0.001,
            locked: false,
            lock_threshold: 0.05,
            unlock_threshold: 0.2,
        }
    }

    pub fn reset(&mut self) {
        self.nco.reset_phase();
        self.nco.set_frequency_hz(self.base_freq_hz);
        self.freq_trim_hz = 0.0;
        self.error_lpf = 1.0;
        self.locked = false;
    }

    pub fn locked(&self) -> bool {
        self.locked
    }

    /// Current tracked pilot frequency estimate in Hz.
    pub fn frequency_hz(&self) -> f32 {
        self.nco.frequency_hz()
    }

    /// Process one real-valued (bandpass-filtered pilot) sample, update the loop, and return the
    /// phase-coherent harmonics for this sample instant.
    pub fn process(&mut self, pilot_sample: f32) -> PilotHarmonics {
        let local = self.nco.step();

        // Phase detector: I/Q downconversion of the pilot against the NCO, quadrature term is
        // proportional to sin(phase_error) for small errors.
        let i = pilot_sample * local.re;
        let q = pilot_sample * local.im;
        // Sign-corrected quadrature error: proportional to sin(phase_error) near lock, and its
        // sign still points the right way even far from lock since the in-phase term's polarity
        // tracks which side of the I axis the instantaneous error has rotated to.
        let error = (if i >= 0.0 { q } else { -q }).clamp(-1.0, 1.0);

        self.freq_trim_hz += self.ki * error / self.sample_rate_hz;
        self.nco.set_frequency_hz(self.base_freq_hz + self.freq_trim_hz + self.kp * error);
        // set_frequency_hz overwrites the NCO rate; re-apply just the trim plus proportional term
        // is intentional — the proportional term provides the fast correction, the integral trim
        // the steady-state frequency offset compensation.

        self.error_lpf += self.error_lpf_alpha * (error.abs() - self.error_lpf);
        if self.locked {
            if self.error_lpf > self.unlock_threshold {
                self.locked = false;
            }
        }
        else if self.error_lpf < self.lock_threshold {
            self.locked = true;
        }

        let f1 = local;
        let f2 = f1 * f1;
        let f4 = f2 * f2;
        let f3 = f4 * f1.conj();

        PilotHarmonics { f1, f2, f3, f4 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_clean_pilot(n: usize, pilot_hz: f32, sample_rate_hz: f32) -> PilotPll {
        let mut pll = PilotPll::new(19_000.0, sample_rate_hz, 5.0);
        for i in 0..n {
            let t = i as f32 / sample_rate_hz;
            let x = (2.0 * std::f32::consts::PI * pilot_hz * t).sin();
            pll.process(x);
        }
        pll
    }

    #[test]
    fn locks_onto_clean_pilot() {
        let pll = run_clean_pilot(50_000, 19_000.0, 256_000.0);
        assert!(pll.locked(), "expected lock, error_lpf={}", pll.error_lpf);
    }

    #[test]
    fn tracks_small_frequency_offset() {
        let pll = run_clean_pilot(100_000, 19_002.0, 256_000.0);
        assert!(pll.locked());
        assert!((pll.frequency_hz() - 19_002.0).abs() < 2.0, "freq={}", pll.frequency_hz());
    }

    #[test]
    fn harmonics_stay_unit_magnitude() {
        let mut pll = PilotPll::new(19_000.0, 256_000.0, 5.0);
        let h = pll.process(0.5);
        assert!((h.f1.norm() - 1.0).abs() < 1e-3);
        assert!((h.f2.norm() - 1.0).abs() < 1e-2);
        assert!((h.f3.norm() - 1.0).abs() < 1e-2);
        assert!((h.f4.norm() - 1.0).abs() < 1e-2);
    }

    #[test]
    fn f3_is_three_times_pilot_phase() {
        let mut pll = PilotPll::new(19_000.0, 256_000.0, 5.0);
        // Run for a bit so frequency settles near nominal, then compare phase relationships on a
        // single step using the NCO's own phase directly.
        for _ in 0..1000 {
            pll.process(0.5);
        }
        let h = pll.process(0.5);
        let expected_f3 = h.f1 * h.f1 * h.f1;
        assert!((h.f3.re - expected_f3.re).abs() < 1e-2);
        assert!((h.f3.im - expected_f3.im).abs() < 1e-2);
    }

    #[test]
    fn does_not_lock_on_noise() {
        use rand::prelude::*;
        let mut rng = rand::rngs::SmallRng::seed_from_u64(42);
        let mut pll = PilotPll::new(19_000.0, 256_000.0, 5.0);
        for _ in 0..50_000 {
            let x: f32 = rng.random_range(-1.0..1.0);
            pll.process(x);
        }
        assert!(!pll.locked());
    }
}
