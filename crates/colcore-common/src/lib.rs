//! colcore-common: error taxonomy and configuration.

pub mod config;
pub mod error;

pub use config::CoreConfig;
pub use error::{ColumnError, ColumnResult};
