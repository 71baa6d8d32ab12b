// fmrds
// Copyright (c) 2024 The fmrds Contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `front_end` module implements the conditioner of §4.A: it converts `C8` samples to
//! normalized `Complex` and realigns arbitrary-length submissions to the decimation grain the
//! channel-select stage needs, so a short or oddly-sized read never fragments a decimation group
//! across two `Pipeline::process` calls.

use crate::dsp::Complex;
use crate::reconstruction::ReconstructionBuffer;
use crate::sample::C8;

/// Converts raw `C8` blocks to normalized `Complex` samples, buffering any remainder that doesn't
/// fill a whole `alignment`-sized group.
pub struct FrontEnd {
    buffer: ReconstructionBuffer<C8>,
}

impl FrontEnd {
    /// `alignment` is the channel-select decimator's factor (`PipelineConfig::channel_decimation`):
    /// the downstream `PolyphaseDecimator` only ever forms a complete output sample from a whole
    /// multiple of this many input samples, so that's the grain the conditioner reconstructs to.
    pub fn new(alignment: usize) -> Self {
        Self { buffer: ReconstructionBuffer::new(alignment) }
    }

    pub fn reset(&mut self) {
        self.buffer.reset();
    }

    /// Condition `input`: subtract the DC bias, scale to +/-1, and return every complete
    /// `alignment`-sized group of samples now available, in submission order. Any leftover tail is
    /// retained for the next call.
    pub fn submit(&mut self, input: &[C8]) -> Vec<Complex> {
        self.buffer.push(input);

        let mut blocks = Vec::new();
        self.buffer.drain_blocks(&mut blocks);

        let mut out = Vec::with_capacity(blocks.len() * self.buffer.block_size());
        for block in blocks {
            out.extend(block.iter().map(|c8| c8.to_complex()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c8s(n: usize) -> Vec<C8> {
        (0..n).map(|i| C8::new(128 + (i % 4) as u8, 127)).collect()
    }

    #[test]
    fn emits_whole_alignment_groups_only() {
        let mut fe = FrontEnd::new(4);
        let out = fe.submit(&c8s(10));
        assert_eq!(out.len(), 8);
    }

    #[test]
    fn residue_carries_to_the_next_submission() {
        let mut fe = FrontEnd::new(4);
        assert_eq!(fe.submit(&c8s(3)).len(), 0);
        let out = fe.submit(&c8s(5));
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn never_drops_or_reorders_samples() {
        let mut fe = FrontEnd::new(7);
        let mut total_in = 0;
        let mut total_out = 0;
        for chunk_len in [3, 11, 2, 0, 19, 1] {
            let chunk = c8s(chunk_len);
            total_in += chunk.len();
            total_out += fe.submit(&chunk).len();
        }
        assert!(total_out <= total_in);
        assert_eq!(total_out % 7, 0);
    }

    #[test]
    fn reset_clears_pending_residue() {
        let mut fe = FrontEnd::new(4);
        fe.submit(&c8s(3));
        fe.reset();
        let out = fe.submit(&c8s(3));
        assert_eq!(out.len(), 0);
    }
}
