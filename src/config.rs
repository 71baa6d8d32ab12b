// fmrds
// Copyright (c) 2024 The fmrds Contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `config` module defines [`PipelineConfig`], the single validated-at-construction surface
//! for tuning the pipeline. `Pipeline::new` is the only fallible entry point in the crate;
//! everything downstream of a successfully constructed pipeline degrades through
//! [`crate::status::PipelineStatus`] rather than returning errors.

use crate::error::{ConfigError, Result};

const MIN_BLOCK_SIZE: u32 = 1024;
const SUPPORTED_AUDIO_RATES: [u32; 3] = [44_100, 48_000, 50_000];
const SUPPORTED_DEEMPHASIS_US: [u32; 2] = [50, 75];

/// The front-end channel-select decimator keeps the post-decimation rate within this band: high
/// enough to comfortably hold the 0-100 kHz MPX spectrum (including the 57 kHz RDS subcarrier and
/// its sidebands), low enough to keep the discriminator's per-sample cost down.
const MIN_CHANNEL_RATE_HZ: f64 = 150_000.0;

/// Construction-time configuration for a [`crate::pipeline::Pipeline`].
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Number of IQ samples consumed per [`crate::pipeline::Pipeline::process`] call.
    pub block_size: u32,
    /// IQ front-end sample rate in Hz.
    pub input_sample_rate_hz: f64,
    /// Peak FM deviation in Hz.
    pub fm_deviation_hz: f64,
    /// De-emphasis time constant in microseconds; 50 (Europe/world) or 75 (North America/Korea).
    pub deemphasis_us: u32,
    /// Output audio sample rate in Hz.
    pub audio_sample_rate_hz: u32,
    /// Whether to expose the post-RRC RDS signal to an [`crate::observer::RdsSignalObserver`].
    pub output_rds_signal: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            block_size: 65536,
            input_sample_rate_hz: 1.024e6,
            fm_deviation_hz: 75_000.0,
            deemphasis_us: 50,
            audio_sample_rate_hz: 48_000,
            output_rds_signal: false,
        }
    }
}

impl PipelineConfig {
    /// Validate this configuration. `input_sample_rate_hz` need not divide `audio_sample_rate_hz`
    /// exactly: the front-end's channel-select decimation (an integer factor, [`Self::channel_decimation`])
    /// and the stereo stage's final resample to `audio_sample_rate_hz` (a rational-rate
    /// [`crate::dsp::resample::LinearResampler`], not required to land on an integer factor) are
    /// independent stages.
    pub fn validate(&self) -> Result<()> {
        if !self.block_size.is_power_of_two() {
            return Err(ConfigError::BlockSizeNotPowerOfTwo(self.block_size));
        }
        if self.block_size < MIN_BLOCK_SIZE {
            return Err(ConfigError::BlockSizeTooSmall(self.block_size));
        }
        if !SUPPORTED_AUDIO_RATES.contains(&self.audio_sample_rate_hz) {
            return Err(ConfigError::UnsupportedAudioRate(self.audio_sample_rate_hz));
        }
        if !SUPPORTED_DEEMPHASIS_US.contains(&self.deemphasis_us) {
            return Err(ConfigError::InvalidDeemphasis(self.deemphasis_us));
        }
        if !self.input_sample_rate_hz.is_finite() || self.input_sample_rate_hz <= 0.0 {
            return Err(ConfigError::InvalidSampleRate(self.input_sample_rate_hz));
        }
        if !self.fm_deviation_hz.is_finite() || self.fm_deviation_hz <= 0.0 {
            return Err(ConfigError::InvalidDeviation(self.fm_deviation_hz));
        }
        Ok(())
    }

    /// The front-end's integer channel-select decimation factor: the largest power of two that
    /// still leaves the post-decimation rate at or above [`MIN_CHANNEL_RATE_HZ`].
    pub fn channel_decimation(&self) -> u32 {
        let mut m: u32 = 1;
        while self.input_sample_rate_hz / f64::from(m * 2) >= MIN_CHANNEL_RATE_HZ {
            m *= 2;
        }
        m
    }

    /// The MPX sample rate after the front-end's channel-select decimation.
    pub fn channel_rate_hz(&self) -> f64 {
        self.input_sample_rate_hz / f64::from(self.channel_decimation())
    }
}
