//! Update propagation for deeply nested immutable record trees
//!
//! Immutable trees make a classic observer design leak: if every node
//! accumulated one "on replace" callback per subscriber, callbacks would
//! pile up forever, and a consumer holding a detached child reference
//! would silently diverge from the live tree. This crate instead chains
//! single-slot, re-subscribing back-pointers from every nested record to
//! the root: each level holds exactly one listener per subscription key,
//! replaced (never accumulated) on every update.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod subscription;

pub use subscription::Subscription;
