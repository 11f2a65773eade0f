use crate::core::{ConfigProvider, ReferenceSet};
use crate::domain::model::{ClassifiedRow, Outcome, Row, UploadType};
use crate::utils::error::{Result, UploadError};

/// The column a given upload type is checked against, resolved against the
/// header of the file being classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnBinding {
    upload_type: UploadType,
    column: String,
    index: usize,
}

impl ColumnBinding {
    /// Fails with [`UploadError::SchemaMismatch`] when `column` is not in `header`.
    pub fn resolve(upload_type: UploadType, column: &str, header: &[String]) -> Result<Self> {
        let index = header
            .iter()
            .position(|name| name.trim() == column)
            .ok_or_else(|| UploadError::SchemaMismatch {
                upload_type: upload_type.to_string(),
                column: column.to_string(),
                available: header.join(", "),
            })?;

        Ok(Self {
            upload_type,
            column: column.to_string(),
            index,
        })
    }

    pub fn from_config<C: ConfigProvider>(
        upload_type: UploadType,
        header: &[String],
        config: &C,
    ) -> Result<Self> {
        Self::resolve(upload_type, config.identifier_column(upload_type), header)
    }

    pub fn upload_type(&self) -> UploadType {
        self.upload_type
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn value<'r>(&self, row: &'r Row) -> &'r str {
        row.get(self.index).unwrap_or_default()
    }
}

pub fn rejection_reason(upload_type: UploadType) -> String {
    match upload_type {
        UploadType::Clients => "Duplicate identifier in clients file".to_string(),
        UploadType::Contacts | UploadType::Results => format!(
            "No matching index client identifier in {} file",
            upload_type
        ),
    }
}

/// Accept/reject decision for one row.
///
/// Clients rows are rejected when their identifier is already known; contacts
/// and results rows are rejected when their cross-reference is unknown. Without
/// a binding (unrecognised upload type) every row is accepted and the type error
/// surfaces later, when the output directory is resolved.
pub fn classify(binding: Option<&ColumnBinding>, row: &Row, reference: &ReferenceSet) -> Outcome {
    let Some(binding) = binding else {
        return Outcome::Accepted;
    };

    let known = reference.contains(binding.value(row));
    let rejected = match binding.upload_type {
        UploadType::Clients => known,
        UploadType::Contacts | UploadType::Results => !known,
    };

    if rejected {
        Outcome::Rejected {
            reason: rejection_reason(binding.upload_type),
        }
    } else {
        Outcome::Accepted
    }
}

pub fn classify_row(
    binding: Option<&ColumnBinding>,
    row: Row,
    reference: &ReferenceSet,
) -> ClassifiedRow {
    let outcome = classify(binding, &row, reference);
    ClassifiedRow { row, outcome }
}
