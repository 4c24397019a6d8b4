//! Foundation types for arbor.
//!
//! Every other arbor crate depends on `arbor-types` for the content
//! identifier that links stored objects together.
//!
//! # Key Types
//!
//! - [`ObjectId`] — 20-byte content identifier, interchangeable with its
//!   40-character hex form

pub mod error;
pub mod object;

pub use error::TypeError;
pub use object::ObjectId;
