//! Shared fixtures for the Brain Intake benchmarks.

pub mod bench_support;
