pub mod authorization;
pub mod config;
pub mod entities;
pub mod error;
pub mod launch_options;
pub mod ledger;
pub mod ports;
pub mod session;
pub mod use_cases;

pub use error::{Error, RefreshFailure};
