//! Core pipeline orchestration for restoscout.
//!
//! This crate ties together source adapters, enrichment, canonicalization and
//! broker delivery into the per-unit workflow (`Pipeline::run_unit`).

pub mod canonical;
pub mod enrichment;
pub mod pipeline;
