//! Shared probe data model for the rtlcov coverage toolchain.
//!
//! A probe is a synthesized 1-bit register written to `1` when its source
//! site executes. This crate defines the immutable [`Probe`] record, the
//! [`ProbeKind`]/[`ProbeDetail`] tag vocabulary, and the [`ProbeAllocator`]
//! that hands out globally unique probe names.

#![warn(missing_docs)]

pub mod probe;

pub use probe::{Probe, ProbeAllocator, ProbeDetail, ProbeKind};
