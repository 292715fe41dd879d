pub mod config;
pub mod error;
pub mod normalize;
pub mod types;

pub use config::{Config, Tuning};
pub use error::GigfeedError;
pub use normalize::*;
pub use types::*;
