//! # scribe-core
//! Foundation types and traits shared by the Scribe crates.

pub mod address;
pub mod constants;
pub mod error;
pub mod network;
pub mod traits;
pub mod types;
