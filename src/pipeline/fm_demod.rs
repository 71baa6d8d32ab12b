// fmrds
// Copyright (c) 2024 The fmrds Contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `fm_demod` module implements §4.B: channel-select decimation, the FM discriminator, and
//! de-emphasis, in that order, producing the baseband multiplex (MPX) signal the stereo and RDS
//! stages consume.

use std::f32::consts::PI;

use crate::dsp::fir::{lowpass_taps, PolyphaseDecimator};
use crate::dsp::iir::SinglePoleIir;
use crate::dsp::Complex;

/// Passband edge of the channel-select filter: comfortably past the 100 kHz MPX occupied
/// bandwidth, short of the 200 kHz adjacent-channel spacing.
const CHANNEL_CUTOFF_HZ: f32 = 120_000.0;
const CHANNEL_FILTER_TAPS: usize = 63;

pub struct FmDemod {
    decimator: PolyphaseDecimator,
    channel_rate_hz: f32,
    fm_deviation_hz: f32,
    prev_sample: Complex,
    deemphasis: SinglePoleIir,
}

impl FmDemod {
    pub fn new(
        input_sample_rate_hz: f64,
        channel_decimation: u32,
        fm_deviation_hz: f64,
        deemphasis_us: u32,
    ) -> Self {
        let channel_rate_hz = (input_sample_rate_hz / f64::from(channel_decimation)) as f32;
        let taps = lowpass_taps(CHANNEL_CUTOFF_HZ, input_sample_rate_hz as f32, CHANNEL_FILTER_TAPS);
        Self {
            decimator: PolyphaseDecimator::new(&taps, channel_decimation as usize),
            channel_rate_hz,
            fm_deviation_hz: fm_deviation_hz as f32,
            prev_sample: Complex::new(1.0, 0.0),
            deemphasis: SinglePoleIir::deemphasis(deemphasis_us as f32, channel_rate_hz),
        }
    }

    pub fn reset(&mut self) {
        self.decimator.reset();
        self.prev_sample = Complex::new(1.0, 0.0);
        self.deemphasis.reset();
    }

    pub fn channel_rate_hz(&self) -> f32 {
        self.channel_rate_hz
    }

    /// Channel-select, discriminate, and de-emphasize `input`, appending MPX samples at
    /// `channel_rate_hz` to `output`.
    pub fn process(&mut self, input: &[Complex], output: &mut Vec<f32>) {
        let mut channel = Vec::new();
        self.decimator.process(input, &mut channel);

        // Discriminator gain: y[n] is in [-1, 1] nominal for a signal deviating by
        // `fm_deviation_hz` around the carrier, per the §4.B formula
        // y[n] = arg(z[n] * conj(z[n-1])) / (2*pi*K_f/Fs1).
        let gain = 2.0 * PI * self.fm_deviation_hz / self.channel_rate_hz;

        for &z in &channel {
            let discriminated = (z * self.prev_sample.conj()).arg() / gain;
            self.prev_sample = z;
            output.push(self.deemphasis.push(discriminated));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fm_modulated_tone(
        audio_hz: f32,
        deviation_hz: f32,
        sample_rate_hz: f32,
        n: usize,
    ) -> Vec<Complex> {
        let mut phase = 0.0f32;
        (0..n)
            .map(|i| {
                let t = i as f32 / sample_rate_hz;
                let audio = (2.0 * PI * audio_hz * t).sin();
                phase += 2.0 * PI * deviation_hz * audio / sample_rate_hz;
                Complex::from_polar(1.0, phase)
            })
            .collect()
    }

    #[test]
    fn recovers_audio_tone_at_roughly_right_amplitude() {
        let input_rate = 1_024_000.0;
        let signal = fm_modulated_tone(1_000.0, 75_000.0, input_rate, input_rate as usize / 4);
        let mut demod = FmDemod::new(input_rate as f64, 4, 75_000.0, 50);
        let mut output = Vec::new();
        demod.process(&signal, &mut output);

        assert!(!output.is_empty());
        let tail = &output[output.len() / 2..];
        let peak = tail.iter().cloned().fold(0.0f32, f32::max);
        assert!(peak > 0.05 && peak < 2.0, "peak={}", peak);
    }

    #[test]
    fn output_rate_matches_channel_decimation() {
        let input_rate = 1_024_000.0;
        let signal = vec![Complex::new(1.0, 0.0); 4096];
        let mut demod = FmDemod::new(input_rate as f64, 4, 75_000.0, 50);
        let mut output = Vec::new();
        demod.process(&signal, &mut output);
        assert_eq!(output.len(), 4096 / 4);
    }

    #[test]
    fn silence_carrier_demodulates_to_near_zero() {
        let input_rate = 1_024_000.0;
        let signal = vec![Complex::new(1.0, 0.0); 2048];
        let mut demod = FmDemod::new(input_rate as f64, 4, 75_000.0, 50);
        let mut output = Vec::new();
        demod.process(&signal, &mut output);
        for &y in &output[output.len() - 10..] {
            assert!(y.abs() < 0.05, "y={}", y);
        }
    }

    #[test]
    fn process_can_be_called_incrementally() {
        let input_rate = 1_024_000.0;
        let signal = fm_modulated_tone(1_000.0, 75_000.0, input_rate, 8192);

        let mut whole = FmDemod::new(input_rate as f64, 4, 75_000.0, 50);
        let mut out_whole = Vec::new();
        whole.process(&signal, &mut out_whole);

        let mut incremental = FmDemod::new(input_rate as f64, 4, 75_000.0, 50);
        let mut out_incremental = Vec::new();
        for chunk in signal.chunks(512) {
            incremental.process(chunk, &mut out_incremental);
        }

        assert_eq!(out_whole.len(), out_incremental.len());
    }
}
