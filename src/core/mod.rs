pub mod classifier;
pub mod enricher;
pub mod materializer;
pub mod orchestrator;
pub mod reference;

pub use crate::domain::model::{ReferenceSet, Row, UploadReport};
pub use crate::domain::ports::{ConfigProvider, ReferenceSource, Storage};
pub use crate::utils::error::Result;
