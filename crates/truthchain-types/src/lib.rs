//! # TruthChain Types
//!
//! Core domain entities, canonical hashing, validation error kinds, and
//! consensus constants shared by every crate in the workspace.
//!
//! ## Design principles
//!
//! - **Single source of truth**: every cross-crate entity is defined here.
//! - **Canonical hashing**: any hash that must agree bit-for-bit across
//!   implementations goes through [`canonical::to_canonical_bytes`].
//! - **Pure validators**: `validate()` never touches storage, the network,
//!   or chain position — callers with that context layer further checks on
//!   top (see `truthchain-chain::validate_block_with_threshold`).

pub mod canonical;
pub mod constants;
pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
