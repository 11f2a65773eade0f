use crate::domain::model::{ReferenceSet, UploadType};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;

    /// Persists `data` at `path` in a single call; readers never observe a partial file.
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Source of identifiers already known downstream.
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    async fn fetch_known_identifiers(&self) -> Result<ReferenceSet>;
}

pub trait ConfigProvider: Send + Sync {
    fn reference_endpoint(&self) -> &str;
    fn output_path(&self) -> &str;
    fn request_timeout(&self) -> Duration;
    fn upload_directory(&self, upload_type: UploadType) -> &str;
    /// Header name of the column the classifier checks for `upload_type`.
    fn identifier_column(&self, upload_type: UploadType) -> &str;
    fn emit_label_row(&self) -> bool;
    fn drop_first_rejected(&self) -> bool;
}
