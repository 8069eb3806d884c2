//! Shared test infrastructure: mock services, recording observers and record
//! builders.

#![allow(dead_code)] // Not every test binary uses every helper

pub mod builders;
pub mod mocks;
pub mod strategies;

pub use builders::*;
pub use mocks::*;
