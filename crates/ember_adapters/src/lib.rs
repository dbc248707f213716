pub mod accounts;
pub mod auth;
pub mod catalog;
pub mod config_repository;
pub mod configuration;
pub mod ledger_repository;
pub mod network;
pub mod news;
pub mod process;
pub mod telemetry;
pub mod unlock;

// Re-exports for convenience
pub use accounts::FileAccountRepository;
pub use auth::{AzAuthClient, MicrosoftRefresher, MojangClient};
pub use catalog::HttpInstanceCatalog;
pub use config_repository::FileClientConfigRepository;
pub use ledger_repository::FileUnlockLedgerRepository;
pub use news::HttpNewsRepository;
pub use process::JavaProcessLauncher;
pub use telemetry::LogBuffer;
pub use unlock::HttpUnlockValidator;
