// fmrds
// Copyright (c) 2024 The fmrds Contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `kernels` module implements the numeric primitives shared by every FIR/polyphase stage:
//! a cumulative multiply-and-sum of a complex vector against a real (`f32`) vector.
//!
//! Three interchangeable realizations are provided — scalar, a 4-wide unrolled form suitable for
//! SSE-class hardware, and an 8-wide unrolled form suitable for AVX2-class hardware — selected
//! once at construction time from a CPU-feature probe, per the portable-intrinsics option
//! described for this kernel. The unrolled forms are safe, auto-vectorizable Rust; none of them
//! reach for `unsafe` `std::arch` intrinsics, so the kernel works unmodified on every target this
//! crate builds for, including non-x86 hosts, while still letting the compiler's auto-vectorizer
//! emit the wide instructions when the detected feature level allows it.

use super::complex::Complex;

/// Which realization of [`dot_c32_f32`] a [`Kernel`] will dispatch to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KernelKind {
    Scalar,
    Sse,
    Avx2,
}

/// A selected numeric kernel, chosen once at construction from the host CPU's feature set.
#[derive(Copy, Clone, Debug)]
pub struct Kernel {
    kind: KernelKind,
}

impl Kernel {
    /// Probe the host CPU and select the widest kernel it supports.
    pub fn detect() -> Self {
        Self { kind: detect_kind() }
    }

    /// Force a specific kernel, bypassing CPU detection. Primarily useful for testing that all
    /// three realizations agree.
    pub fn with_kind(kind: KernelKind) -> Self {
        Self { kind }
    }

    /// The realization this kernel dispatches to.
    pub fn kind(&self) -> KernelKind {
        self.kind
    }

    /// Compute `sum(taps[i] * samples[i])` for `i` in `0..taps.len()`.
    ///
    /// `samples` and `taps` must have equal length.
    #[inline]
    pub fn dot_c32_f32(&self, samples: &[Complex], taps: &[f32]) -> Complex {
        debug_assert_eq!(samples.len(), taps.len());
        match self.kind {
            KernelKind::Scalar => dot_scalar(samples, taps),
            KernelKind::Sse => dot_unrolled::<4>(samples, taps),
            KernelKind::Avx2 => dot_unrolled::<8>(samples, taps),
        }
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Kernel::detect()
    }
}

#[cfg(target_arch = "x86_64")]
fn detect_kind() -> KernelKind {
    if is_x86_feature_detected!("avx2") {
        KernelKind::Avx2
    }
    else if is_x86_feature_detected!("sse3") {
        KernelKind::Sse
    }
    else {
        KernelKind::Scalar
    }
}

#[cfg(not(target_arch = "x86_64"))]
fn detect_kind() -> KernelKind {
    KernelKind::Scalar
}

/// Reference scalar implementation: multiply-accumulate one sample at a time.
fn dot_scalar(samples: &[Complex], taps: &[f32]) -> Complex {
    let mut acc = Complex::default();
    for (&s, &t) in samples.iter().zip(taps.iter()) {
        acc += s * t;
    }
    acc
}

/// Multiply-accumulate `W` lanes at a time into `W` independent accumulators, combined at the
/// end. This is the shape a compiler needs to see in order to auto-vectorize the loop onto
/// `W`-wide SIMD registers; the remainder (`samples.len() % W`) falls back to the scalar loop.
fn dot_unrolled<const W: usize>(samples: &[Complex], taps: &[f32]) -> Complex {
    let n = samples.len();
    let n_vec = n - (n % W);

    let mut acc = [Complex::default(); 16];
    debug_assert!(W <= acc.len());

    let mut i = 0;
    while i < n_vec {
        for lane in 0..W {
            acc[lane] += samples[i + lane] * taps[i + lane];
        }
        i += W;
    }

    let mut total = Complex::default();
    for a in acc.iter().take(W) {
        total += *a;
    }
    total += dot_scalar(&samples[n_vec..], &taps[n_vec..]);
    total
}
