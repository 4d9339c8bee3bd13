#![crate_name = "rlwe"]
#![crate_type = "lib"]
#![warn(missing_docs, unused_imports)]
#![doc = include_str!("../README.md")]

mod ciphertext;
mod context;
mod errors;
mod serialization;

pub mod encrypted_array;
pub mod keys;

pub use ciphertext::{Ciphertext, CiphertextPart};
pub use context::{BootstrapParameters, Context, ContextBuilder, Scheme};
pub use errors::{Error, ParametersError, Result};
pub use serialization::markers;

#[cfg(test)]
#[macro_use]
extern crate proptest;
