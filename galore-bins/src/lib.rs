//! Shared code for the Galore binaries

pub mod common;
