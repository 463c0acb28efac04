//! # Stowage Testkit
//!
//! Test utilities for Stowage.
//!
//! This crate provides:
//! - In-process fakes for the object-store and container-store collaborators
//! - Storage fixtures for every backend
//! - Property-based test generators using proptest
//! - Tracing setup for tests
//!
//! The cross-backend conformance suite lives in this crate's `tests/`.
//!
//! ## Usage
//!
//! ```rust
//! use stowage_testkit::prelude::*;
//!
//! let (storage, fake) = s3_storage();
//! storage.save("a.txt", "hello").unwrap();
//! assert_eq!(fake.object(TEST_BUCKET, b"a.txt").unwrap().data, b"hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fakes;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fakes::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fakes::*;
pub use fixtures::*;
pub use generators::*;
