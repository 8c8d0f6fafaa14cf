//! Public channel registry oracle for chanprobe.
//!
//! [`HttpRegistry`] asks a public Lightning explorer whether a funding
//! outpoint belongs to an announced channel by submitting its search form
//! and looking for the outpoint in the result page. Any failure answers
//! "not public", which biases the private channel estimate upward while
//! the registry is unavailable; failures are logged at `warn`.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod config;
mod error;
mod oracle;

pub use config::{RegistryConfig, DEFAULT_ENDPOINT};
pub use error::{RegistryError, Result};
pub use oracle::{response_matches, HttpRegistry};
