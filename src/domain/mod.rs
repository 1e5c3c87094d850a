//! Domain layer for coverloop
//!
//! Pure models, collaborator ports and domain errors. Nothing in here talks to
//! the network, the filesystem or a subprocess.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
