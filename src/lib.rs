pub mod config;
pub mod db;
pub mod error;
pub mod estimator;
pub mod refresh;
pub mod server;
pub mod sources;
pub mod summary;
mod utils;

pub use error::MeridianError;
pub use refresh::{RefreshReport, RefreshService};
