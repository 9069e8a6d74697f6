//! Editor composition and the editor/store data flow.
//!
//! # Responsibility
//! - Describe editor features as a fixed set of capabilities composed into a
//!   profile at construction time.
//! - Turn editor edits into store change events and store snapshots into
//!   render decisions.

pub mod binding;
pub mod capability;
