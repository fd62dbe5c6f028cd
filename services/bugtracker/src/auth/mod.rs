//! Authentication and authorization modules.
//!
//! # Purpose
//! Groups password hashing, JWT minting/verification, permission rules, and
//! the startup admin seed.
pub mod bootstrap;
pub mod passwords;
pub mod permissions;
pub mod tokens;
