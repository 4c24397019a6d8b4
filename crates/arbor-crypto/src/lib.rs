//! Content hashing for arbor.
//!
//! Provides domain-separated BLAKE3 hashing that yields 20-byte
//! [`ObjectId`](arbor_types::ObjectId)s. Wraps an established library — no
//! custom cryptography.

pub mod hasher;

pub use hasher::ContentHasher;
