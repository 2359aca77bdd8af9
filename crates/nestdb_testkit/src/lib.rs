//! # nestdb testkit
//!
//! Test utilities for nestdb.
//!
//! This crate provides:
//! - Test fixtures and database helpers
//! - Property-based test generators using proptest
//! - A replayer that applies replicated instructions to a plain model
//! - Reader/writer stress runs
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nestdb_testkit::prelude::*;
//!
//! #[test]
//! fn nested_lists() {
//!     let fixture = DocFixture::memory();
//!     let items = fixture.items();
//!     items.add(1).unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod replay;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::replay::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use replay::*;
pub use stress::*;
