//! Core domain types for opusbench.

pub mod session;
pub mod summary;

pub use session::{StartSignal, StoreKind, TickRate};
pub use summary::{DecodeSummary, SessionFailure};
