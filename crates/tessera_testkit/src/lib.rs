//! # Tessera Testkit
//!
//! Test utilities for Tessera.
//!
//! This crate provides:
//! - Scriptable participants that record the protocol calls they receive
//! - World fixtures and consistency checks
//! - Property-based test generators using proptest
//! - Stress testing utilities
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tessera_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_world() {
//!     let fixture = WorldFixture::new();
//!     let level = fixture.level("cave", &open_board(3, 3));
//!     let hero = fixture.player_at(&level, "hero", 1, 1);
//!     // ... test operations
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod participant;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::participant::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use participant::*;
pub use stress::*;
