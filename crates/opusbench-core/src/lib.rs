//! # opusbench-core
//!
//! Core types and error handling shared by the opusbench crates.

pub mod error;
pub mod types;

pub use error::{Error, IoOperation, Result};
pub use types::*;
