//! Core commitment, proving and verification routines for blockproof.
//!
//! This crate defines the block tree, its authentication paths, and the integrity proof protocol
//! built on top of them: replaying a leaf's recombination up to the root as an explicit execution
//! trace, checking a fixed list of constraints over that trace, and comparing the result with a
//! committed root.
//!
//! The core types and proof verification routines of this crate do not require the
//! standard library, but do require Rust's alloc crate.

#![cfg_attr(all(not(feature = "std"), not(test)), no_std)]

extern crate alloc;

pub mod hasher;
pub mod proof;
pub mod tree;

pub use hasher::{Digest, NodeHasher};
#[cfg(feature = "sha3-hasher")]
pub use hasher::Sha3Hasher;
pub use tree::{AuthPath, MerkleTree, TreeError};
