use crate::domain::model::{CallerIdentity, EnrichedRow, Row, IDENTITY_FIELDS};

/// Appends the caller's provider, team, team id and location id to an accepted row.
pub fn enrich(row: Row, caller: &CallerIdentity) -> EnrichedRow {
    let mut values = row.into_values();
    values.extend(caller.values().iter().map(|v| v.to_string()));
    EnrichedRow { values }
}

/// Self-describing record whose every value is its own column name.
pub fn label_row(header: &[String]) -> EnrichedRow {
    EnrichedRow {
        values: header.to_vec(),
    }
}

/// Output header: the uploaded file's columns followed by the identity fields.
pub fn output_header(columns: &[String]) -> Vec<String> {
    columns
        .iter()
        .cloned()
        .chain(IDENTITY_FIELDS.iter().map(|f| f.to_string()))
        .collect()
}

/// Accepted rows of one upload, kept in memory until materialisation.
///
/// The header lives beside the data rather than inside it. When label rows are
/// enabled, the first push also produces the label record, so it is always
/// the first record emitted whenever anything was accepted.
#[derive(Debug, Clone)]
pub struct AcceptedBuffer {
    header: Vec<String>,
    emit_label_row: bool,
    label: Option<EnrichedRow>,
    rows: Vec<EnrichedRow>,
}

impl AcceptedBuffer {
    pub fn new(columns: &[String], emit_label_row: bool) -> Self {
        Self {
            header: output_header(columns),
            emit_label_row,
            label: None,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Row, caller: &CallerIdentity) {
        if self.rows.is_empty() && self.emit_label_row {
            self.label = Some(label_row(&self.header));
        }
        self.rows.push(enrich(row, caller));
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Records in emission order, label row first when present.
    pub fn records(&self) -> impl Iterator<Item = &EnrichedRow> {
        self.label.iter().chain(self.rows.iter())
    }

    /// Number of data rows, not counting the label row.
    pub fn accepted_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
