// fmrds
// Copyright (c) 2024 The fmrds Contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `rrc` module generates root-raised-cosine matched-filter taps for the RDS physical layer
//! (§4.D): `beta = 1`, symbol period `T_s = 1/1187.5 s`, spanning at least 6 symbols.

use std::f32::consts::PI;

/// Generate root-raised-cosine filter taps.
///
/// `beta` is the roll-off factor, `symbol_rate_hz` the symbol rate, `sample_rate_hz` the rate the
/// filter will run at, and `span_symbols` the (even) number of symbol periods the filter spans;
/// the tap count is `span_symbols * samples_per_symbol + 1`, centered so the filter is symmetric
/// and zero-phase. Taps are normalized so the filter has unity gain at DC.
pub fn rrc_taps(beta: f32, symbol_rate_hz: f32, sample_rate_hz: f32, span_symbols: usize) -> Vec<f32> {
    assert!(beta > 0.0 && beta <= 1.0);
    assert!(span_symbols > 0);

    let sps = sample_rate_hz / symbol_rate_hz;
    let ts = 1.0 / symbol_rate_hz;
    let num_taps = (span_symbols as f32 * sps).round() as usize + 1;
    let mid = (num_taps - 1) as f32 / 2.0;

    let mut taps: Vec<f32> = (0..num_taps)
        .map(|i| {
            let t = (i as f32 - mid) / sample_rate_hz;
            rrc_impulse(t, beta, ts)
        })
        .collect();

    let sum: f32 = taps.iter().sum();
    if sum.abs() > 1e-12 {
        for tap in taps.iter_mut() {
            *tap /= sum;
        }
    }
    taps
}

/// The continuous-time root-raised-cosine impulse response, handling the two removable
/// singularities at `t = 0` and `t = +/- T_s / (4*beta)` by their limiting values.
fn rrc_impulse(t: f32, beta: f32, ts: f32) -> f32 {
    if t.abs() < 1e-9 {
        return (1.0 - beta + 4.0 * beta / PI) / ts;
    }

    let denom_term = 4.0 * beta * t / ts;
    if (denom_term.abs() - 1.0).abs() < 1e-6 {
        let inner = PI / (4.0 * beta);
        return (beta / (ts * 2.0f32.sqrt()))
            * ((1.0 + 2.0 / PI) * inner.sin() + (1.0 - 2.0 / PI) * inner.cos());
    }

    let num = (PI * t / ts * (1.0 - beta)).sin()
        + 4.0 * beta * t / ts * (PI * t / ts * (1.0 + beta)).cos();
    let den = PI * t / ts * (1.0 - (4.0 * beta * t / ts).powi(2)) * ts;
    num / den
}
