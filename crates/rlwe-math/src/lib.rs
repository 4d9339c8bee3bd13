#![crate_name = "rlwe_math"]
#![crate_type = "lib"]
#![warn(missing_docs, unused_imports)]

//! Mathematical utilities for the rlwe.rs library.

mod errors;

pub mod rns;
pub mod rq;
pub mod zm;
pub mod zq;

pub use errors::{Error, Result};

#[cfg(test)]
#[macro_use]
extern crate proptest;
