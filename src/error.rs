// fmrds
// Copyright (c) 2024 The fmrds Contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `error` module defines the pipeline's single fallible surface.
//!
//! Only construction (`Pipeline::new`) can fail. Everything past construction is a DSP or RDS
//! state machine that degrades (falls back to mono, re-enters `Hunt`, drops a block) rather than
//! returning an error; those conditions are surfaced through [`crate::status::PipelineStatus`]
//! instead.

use std::error::Error as StdError;
use std::fmt;

/// Reasons `Pipeline::new` refuses to construct a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// `block_size` was not a power of two.
    BlockSizeNotPowerOfTwo(u32),
    /// `block_size` was a power of two but too small to carry a full RDS group window.
    BlockSizeTooSmall(u32),
    /// `audio_sample_rate_hz` was not one of the supported output rates.
    UnsupportedAudioRate(u32),
    /// `deemphasis_us` was not 50 or 75.
    InvalidDeemphasis(u32),
    /// `input_sample_rate_hz` was not finite and positive.
    InvalidSampleRate(f64),
    /// `fm_deviation_hz` was not finite and positive.
    InvalidDeviation(f64),
}

impl ConfigError {
    fn description(&self) -> String {
        match *self {
            ConfigError::BlockSizeNotPowerOfTwo(n) => {
                format!("block_size {} is not a power of two", n)
            }
            ConfigError::BlockSizeTooSmall(n) => {
                format!("block_size {} is too small to hold a full RDS group", n)
            }
            ConfigError::UnsupportedAudioRate(hz) => {
                format!("unsupported audio_sample_rate_hz {} (expected 44100, 48000, or 50000)", hz)
            }
            ConfigError::InvalidDeemphasis(us) => {
                format!("invalid deemphasis_us {} (expected 50 or 75)", us)
            }
            ConfigError::InvalidSampleRate(hz) => {
                format!("invalid input_sample_rate_hz {}", hz)
            }
            ConfigError::InvalidDeviation(hz) => {
                format!("invalid fm_deviation_hz {}", hz)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid pipeline configuration: {}", self.description())
    }
}

impl StdError for ConfigError {}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_mention_offending_value() {
        let err = ConfigError::BlockSizeNotPowerOfTwo(100);
        assert!(err.to_string().contains("100"));

        let err = ConfigError::UnsupportedAudioRate(22050);
        assert!(err.to_string().contains("22050"));
    }
}
