//! Per-dialect-family text generators.

pub mod sqlserver;
