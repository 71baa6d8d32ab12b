// fmrds
// Copyright (c) 2024 The fmrds Contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A broadcast FM and RDS demodulation pipeline: IQ samples in, stereo audio frames and a decoded
//! RDS station database out.
//!
//! [`config::PipelineConfig`] configures a [`pipeline::Pipeline`], the sequential stage-A-through-E
//! state machine of §3/§4. [`pipeline::Worker`] wraps one in a dedicated thread fed from a bounded
//! [`observer::InputQueue`], per the concurrency model of §5.

pub mod config;
pub mod dsp;
pub mod error;
pub mod observer;
pub mod pipeline;
pub mod rds;
pub mod reconstruction;
pub mod sample;
pub mod status;
pub mod units;

pub use config::PipelineConfig;
pub use error::{ConfigError, Result};
pub use pipeline::{Pipeline, Worker};
