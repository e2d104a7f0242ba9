//! litharvest-common: Shared error taxonomy and outbound HTTP plumbing used
//! by every litharvest crate.

pub mod error;
pub mod http;

pub use error::{LitharvestError, Result};
pub use http::{HttpSettings, PoliteClient};
