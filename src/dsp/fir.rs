// fmrds
// Copyright (c) 2024 The fmrds Contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `fir` module implements windowed-sinc low-pass tap generation plus two filter primitives
//! built on the shared [`Kernel`](super::kernels::Kernel): a plain real FIR for filtering a real
//! signal, and a polyphase decimating FIR for filtering-and-downsampling a complex signal without
//! ever multiplying a sample that will be thrown away.

use std::f32::consts::PI;

use super::complex::Complex;
use super::kernels::Kernel;

/// Generate the taps of a windowed-sinc low-pass filter.
///
/// `cutoff_hz` is the -6 dB point, `sample_rate_hz` the rate the filter will run at, and
/// `num_taps` the (odd, for a symmetric zero-phase filter) tap count. A Hamming window is applied,
/// matching the window used by the pack's MPX low-pass generators.
pub fn lowpass_taps(cutoff_hz: f32, sample_rate_hz: f32, num_taps: usize) -> Vec<f32> {
    assert!(num_taps > 0);

    let fc = cutoff_hz / sample_rate_hz;
    let m = num_taps as isize - 1;

    let mut taps: Vec<f32> = (0..num_taps)
        .map(|i| {
            let k = i as isize - m / 2;
            let sinc = if k == 0 { 2.0 * fc } else { (2.0 * PI * fc * k as f32).sin() / (PI * k as f32) };
            let window = 0.54 - 0.46 * (2.0 * PI * i as f32 / m as f32).cos();
            sinc * window
        })
        .collect();

    // Normalize for unity DC gain.
    let sum: f32 = taps.iter().sum();
    if sum.abs() > 1e-12 {
        for t in taps.iter_mut() {
            *t /= sum;
        }
    }
    taps
}

/// Shift a low-pass filter's passband to straddle `center_hz`, by modulating its (unity-DC-gain)
/// impulse response with a cosine at the target center frequency. Used to isolate the 19 kHz pilot
/// and 57 kHz RDS subcarrier from the MPX signal (§4.C, §4.D) without a dedicated bandpass design.
pub fn bandpass_taps(center_hz: f32, half_bandwidth_hz: f32, sample_rate_hz: f32, num_taps: usize) -> Vec<f32> {
    let lp = lowpass_taps(half_bandwidth_hz, sample_rate_hz, num_taps);
    let m = num_taps as isize - 1;
    lp.iter()
        .enumerate()
        .map(|(i, &t)| {
            let k = i as isize - m / 2;
            t * 2.0 * (2.0 * PI * center_hz * k as f32 / sample_rate_hz).cos()
        })
        .collect()
}

/// A real-valued direct-form FIR filter with a persistent delay line.
///
/// The delay line is strictly `taps.len() - 1` samples long: it holds exactly the history needed
/// to produce the next output sample and no more.
pub struct Fir {
    taps: Vec<f32>,
    /// Most recent sample first.
    delay: Vec<f32>,
}

impl Fir {
    pub fn new(taps: Vec<f32>) -> Self {
        assert!(!taps.is_empty());
        let delay = vec![0.0; taps.len() - 1];
        Self { taps, delay }
    }

    pub fn num_taps(&self) -> usize {
        self.taps.len()
    }

    /// Group delay in samples, `(N-1)/2`, for an odd-length symmetric filter.
    pub fn group_delay(&self) -> f32 {
        (self.taps.len() as f32 - 1.0) / 2.0
    }

    pub fn reset(&mut self) {
        self.delay.iter_mut().for_each(|d| *d = 0.0);
    }

    /// Filter `input` in place into `output`, which must have the same length as `input`.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) {
        assert_eq!(input.len(), output.len());

        for (x, y) in input.iter().zip(output.iter_mut()) {
            *y = self.push(*x);
        }
    }

    /// Push a single sample through the filter, returning the filtered output.
    #[inline]
    pub fn push(&mut self, x: f32) -> f32 {
        let n = self.taps.len();
        let mut acc = self.taps[0] * x;
        for i in 1..n {
            acc += self.taps[i] * self.delay[i - 1];
        }
        if !self.delay.is_empty() {
            self.delay.rotate_right(1);
            self.delay[0] = x;
        }
        acc
    }
}

/// A polyphase decimating low-pass filter for a complex baseband signal.
///
/// Implements the channel-selection stage of §4.B. A naive "filter then decimate" would run the
/// full multiply-accumulate at the *input* rate and throw away `decimation - 1` out of every
/// `decimation` results. Here the commutator only ever forms the dot product once per decimated
/// output sample — at the output rate — so no multiply is ever performed on a sample whose
/// result would be discarded.
pub struct PolyphaseDecimator {
    /// Filter taps. Assumed symmetric (every tap generator in this module produces a symmetric
    /// windowed-sinc filter), so `taps[0]` can be paired directly with `history[0]` (the newest
    /// sample) without needing a separate time-reversed copy.
    taps: Vec<f32>,
    /// Ring of the last `taps.len()` complex input samples, newest first.
    history: Vec<Complex>,
    decimation: usize,
    kernel: Kernel,
}

impl PolyphaseDecimator {
    /// Build a decimator from a prototype low-pass filter's taps and a decimation factor `m`.
    pub fn new(taps: &[f32], decimation: usize) -> Self {
        assert!(decimation > 0);
        assert!(!taps.is_empty());

        Self {
            history: vec![Complex::default(); taps.len()],
            taps: taps.to_vec(),
            decimation,
            kernel: Kernel::detect(),
        }
    }

    pub fn decimation(&self) -> usize {
        self.decimation
    }

    pub fn num_taps(&self) -> usize {
        self.taps.len()
    }

    pub fn reset(&mut self) {
        self.history.iter_mut().for_each(|s| *s = Complex::default());
    }

    /// Consume `input` and append every produced output sample to `output`. Returns the number
    /// of output samples produced. `input.len()` need not be a multiple of `decimation`; any
    /// remainder is simply not enough to form another output sample and is dropped here because
    /// the front-end conditioner (§4.A) is responsible for only ever handing over blocks sized
    /// to the decimation ratio.
    pub fn process(&mut self, input: &[Complex], output: &mut Vec<Complex>) -> usize {
        let mut produced = 0;
        let n = self.history.len();

        for chunk in input.chunks(self.decimation) {
            if chunk.len() < self.decimation {
                break;
            }

            // Slide the newest `decimation` samples into history (newest-first ordering), then
            // form exactly one dot product for this output sample.
            self.history.rotate_right(chunk.len().min(n));
            for (slot, &sample) in self.history.iter_mut().zip(chunk.iter().rev()) {
                *slot = sample;
            }

            output.push(self.kernel.dot_c32_f32(&self.history, &self.taps));
            produced += 1;
        }
        produced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowpass_taps_has_unity_dc_gain() {
        let taps = lowpass_taps(1000.0, 48000.0, 63);
        let dc: f32 = taps.iter().sum();
        assert!((dc - 1.0).abs() < 1e-4);
    }

    #[test]
    fn bandpass_taps_reject_dc() {
        let taps = bandpass_taps(19_000.0, 2_000.0, 256_000.0, 127);
        let dc: f32 = taps.iter().sum();
        assert!(dc.abs() < 0.05, "dc={}", dc);
    }

    #[test]
    fn fir_delay_line_is_n_minus_one() {
        let fir = Fir::new(vec![1.0, 0.5, 0.25, 0.125]);
        assert_eq!(fir.delay.len(), 3);
    }

    #[test]
    fn fir_passes_dc_at_unity_gain() {
        let taps = lowpass_taps(100.0, 1000.0, 31);
        let mut fir = Fir::new(taps);
        let input = vec![1.0f32; 200];
        let mut output = vec![0.0f32; 200];
        fir.process(&input, &mut output);
        // After the filter's settling time the output should converge to ~1.0 (unity DC gain).
        let tail_avg: f32 = output[150..].iter().sum::<f32>() / 50.0;
        assert!((tail_avg - 1.0).abs() < 0.05);
    }

    #[test]
    fn polyphase_decimator_reduces_sample_count_by_m() {
        let taps = lowpass_taps(50_000.0, 1_024_000.0, 63);
        let mut dec = PolyphaseDecimator::new(&taps, 4);
        let input = vec![Complex::new(1.0, 0.0); 256];
        let mut output = Vec::new();
        let produced = dec.process(&input, &mut output);
        assert_eq!(produced, 64);
        assert_eq!(output.len(), 64);
    }

    #[test]
    fn polyphase_decimator_passes_dc_at_unity_gain() {
        let taps = lowpass_taps(50_000.0, 1_024_000.0, 63);
        let mut dec = PolyphaseDecimator::new(&taps, 4);
        let input = vec![Complex::new(1.0, 0.0); 4096];
        let mut output = Vec::new();
        dec.process(&input, &mut output);
        let tail_avg = output[output.len() - 64..]
            .iter()
            .map(|c| c.re)
            .sum::<f32>()
            / 64.0;
        assert!((tail_avg - 1.0).abs() < 0.1, "tail_avg={}", tail_avg);
    }
}
