use crate::core::enricher::AcceptedBuffer;
use crate::core::{ConfigProvider, Storage};
use crate::domain::model::UploadType;
use crate::utils::error::{Result, UploadError};
use csv::{QuoteStyle, WriterBuilder};
use std::path::Path;

/// Relative target of the persisted file: `<upload directory>/<base file name>`.
pub fn target_path<C: ConfigProvider>(
    config: &C,
    upload_type: UploadType,
    file_name: &str,
) -> Result<String> {
    let base = Path::new(file_name)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| UploadError::InvalidFileName {
            name: file_name.to_string(),
        })?;

    let directory = config.upload_directory(upload_type).trim_end_matches('/');
    Ok(format!("{}/{}", directory, base))
}

/// Serialises the buffer as CSV with every field quoted.
pub fn render_csv(buffer: &AcceptedBuffer) -> Result<Vec<u8>> {
    if buffer.is_empty() {
        return Err(UploadError::NoAcceptableRows);
    }

    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(Vec::new());

    writer.write_record(buffer.header())?;
    for record in buffer.records() {
        writer.write_record(&record.values)?;
    }

    writer.into_inner().map_err(|e| UploadError::IoError(e.into_error()))
}

/// Renders the accepted rows and hands them to storage in one write.
pub async fn write<S: Storage>(storage: &S, target: &str, buffer: &AcceptedBuffer) -> Result<()> {
    let data = render_csv(buffer)?;

    tracing::debug!("Writing {} bytes to {}", data.len(), target);
    storage
        .write_file(target, &data)
        .await
        .map_err(|e| match e {
            UploadError::IoError(source) => UploadError::WriteFailure {
                path: target.to_string(),
                source,
            },
            other => other,
        })
}
