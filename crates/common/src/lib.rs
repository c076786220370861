//! Shared primitives for the keyd workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
