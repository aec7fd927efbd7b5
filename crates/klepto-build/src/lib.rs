pub mod config;
pub mod error;
pub mod executor;
pub mod flags;
pub mod manifest;
pub mod orchestrator;
pub mod package;
pub mod platform;
pub mod products;
pub mod tools;
pub mod versions;
pub mod workspace;

pub use error::{Error, ErrorKind, Result};
