pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{LocalStorage, TomlConfig};

pub use core::{orchestrator::UploadOrchestrator, reference::HttpReferenceFetcher};
pub use domain::model::{CallerIdentity, UploadFile, UploadReport, UploadType};
pub use domain::response::{ErrorResponse, StatusResponse, UploadResponse};
pub use utils::error::{Result, UploadError};
