use crate::core::classifier::{self, ColumnBinding};
use crate::core::enricher::AcceptedBuffer;
use crate::core::materializer;
use crate::core::{ConfigProvider, ReferenceSource, Storage};
use crate::domain::model::{
    CallerIdentity, ClassifiedRow, Outcome, RejectedRow, Row, UploadFile, UploadReport, UploadType,
};
use crate::utils::error::{Result, UploadError};
use csv::ReaderBuilder;
use std::io::Read;
use std::sync::Arc;

/// Rows classified between two cooperative yields, so an abandoned request
/// stops promptly even on very large files.
const ROWS_PER_YIELD: usize = 1024;

/// Runs one upload end to end: reference fetch, a single streaming pass of
/// classification and enrichment, then one write of the accepted rows.
pub struct UploadOrchestrator<S: Storage, R: ReferenceSource, C: ConfigProvider> {
    storage: S,
    reference: R,
    config: C,
}

impl<S: Storage, R: ReferenceSource, C: ConfigProvider> UploadOrchestrator<S, R, C> {
    pub fn new(storage: S, reference: R, config: C) -> Self {
        Self {
            storage,
            reference,
            config,
        }
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    /// Entry point for a transport request that may not carry a file.
    pub async fn handle_request(
        &self,
        file: Option<UploadFile>,
        caller: &CallerIdentity,
    ) -> Result<UploadReport> {
        let Some(file) = file else {
            tracing::error!("Upload request without an attached file");
            return Err(UploadError::MissingFile);
        };
        self.handle_upload(&file.bytes, &file.file_name, caller).await
    }

    pub async fn handle_upload(
        &self,
        file_bytes: &[u8],
        file_name: &str,
        caller: &CallerIdentity,
    ) -> Result<UploadReport> {
        self.handle_upload_reader(file_bytes, file_name, caller)
            .await
    }

    /// Same as [`handle_upload`](Self::handle_upload) over any byte stream; the
    /// input is read once, front to back.
    pub async fn handle_upload_reader<Rd: Read + Send>(
        &self,
        reader: Rd,
        file_name: &str,
        caller: &CallerIdentity,
    ) -> Result<UploadReport> {
        match self.process(reader, file_name, caller).await {
            Ok(report) => Ok(report),
            Err(e) => {
                tracing::error!(
                    "Upload of '{}' failed: {} (Category: {:?}, Severity: {:?})",
                    file_name,
                    e,
                    e.category(),
                    e.severity()
                );
                Err(e)
            }
        }
    }

    async fn process<Rd: Read + Send>(
        &self,
        reader: Rd,
        file_name: &str,
        caller: &CallerIdentity,
    ) -> Result<UploadReport> {
        let type_segment = file_name.split('_').nth(1).unwrap_or_default();
        let upload_type = UploadType::from_file_name(file_name);
        match upload_type {
            Some(t) => tracing::info!("Processing {} upload '{}'", t, file_name),
            None => tracing::warn!(
                "Unrecognised upload type '{}' in '{}'; rows will be accepted unchecked",
                type_segment,
                file_name
            ),
        }

        let reference = self.reference.fetch_known_identifiers().await?;
        tracing::info!("Loaded {} known identifiers", reference.len());

        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let columns: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|name| name.to_string())
            .collect();
        let shared_columns: Arc<[String]> = columns.clone().into();

        let binding = match upload_type {
            Some(t) if !columns.is_empty() => {
                Some(ColumnBinding::from_config(t, &columns, &self.config)?)
            }
            _ => None,
        };
        if let Some(binding) = &binding {
            tracing::debug!(
                "Checking {} rows against column '{}'",
                binding.upload_type(),
                binding.column()
            );
        }

        let mut accepted = AcceptedBuffer::new(&columns, self.config.emit_label_row());
        let mut rejected_rows = Vec::new();

        for (index, record) in csv_reader.into_records().enumerate() {
            let record = record?;
            let mut values: Vec<String> = record.iter().map(|v| v.to_string()).collect();
            if values.len() != columns.len() {
                // Ragged rows are aligned to the header so the output stays rectangular.
                tracing::debug!(
                    "Row {} has {} field(s), header has {}",
                    index + 1,
                    values.len(),
                    columns.len()
                );
                values.resize(columns.len(), String::new());
            }
            let row = Row::new(shared_columns.clone(), values);

            let ClassifiedRow { row, outcome } =
                classifier::classify_row(binding.as_ref(), row, &reference);
            match outcome {
                Outcome::Accepted => accepted.push(row, caller),
                Outcome::Rejected { reason } => {
                    if let Some(binding) = &binding {
                        tracing::debug!(
                            "Row {} rejected ({}={}): {}",
                            index + 1,
                            binding.column(),
                            row.get_named(binding.column()).unwrap_or_default(),
                            reason
                        );
                    }
                    rejected_rows.push(RejectedRow { row, reason });
                }
            }

            if (index + 1) % ROWS_PER_YIELD == 0 {
                tokio::task::yield_now().await;
            }
        }

        tracing::info!(
            "Classified {} row(s): {} accepted, {} rejected",
            accepted.accepted_count() + rejected_rows.len(),
            accepted.accepted_count(),
            rejected_rows.len()
        );

        if accepted.is_empty() {
            return Err(UploadError::NoAcceptableRows);
        }

        let upload_type = upload_type.ok_or_else(|| UploadError::InvalidUploadType {
            value: type_segment.to_string(),
        })?;
        let target = materializer::target_path(&self.config, upload_type, file_name)?;
        materializer::write(&self.storage, &target, &accepted).await?;
        tracing::info!(
            "Saved {} accepted row(s) to {}/{}",
            accepted.accepted_count(),
            self.config.output_path(),
            target
        );

        let rejected = !rejected_rows.is_empty();
        if rejected && self.config.drop_first_rejected() {
            let dropped = rejected_rows.remove(0);
            tracing::warn!(
                "Omitting first rejected row from the report ({}); disable drop_first_rejected to report it",
                dropped.reason
            );
        }

        Ok(UploadReport {
            upload_type,
            output_path: target,
            accepted_count: accepted.accepted_count(),
            rejected,
            rejected_rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::ReferenceSet;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                files: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }

        async fn file_count(&self) -> usize {
            self.files.lock().await.len()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                UploadError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    struct StaticReference {
        ids: Option<Vec<&'static str>>,
        calls: AtomicUsize,
    }

    impl StaticReference {
        fn known(ids: &[&'static str]) -> Self {
            Self {
                ids: Some(ids.to_vec()),
                calls: AtomicUsize::new(0),
            }
        }

        fn unavailable() -> Self {
            Self {
                ids: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ReferenceSource for StaticReference {
        async fn fetch_known_identifiers(&self) -> Result<ReferenceSet> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.ids {
                Some(ids) => Ok(ids.iter().map(|id| id.to_string()).collect()),
                None => Err(UploadError::UpstreamUnavailable {
                    message: "status 500".to_string(),
                }),
            }
        }
    }

    struct MockConfig {
        drop_first_rejected: bool,
    }

    impl ConfigProvider for MockConfig {
        fn reference_endpoint(&self) -> &str {
            "http://test.com/get-uploaded-ctc-numbers"
        }

        fn output_path(&self) -> &str {
            "test_output"
        }

        fn request_timeout(&self) -> Duration {
            Duration::from_secs(5)
        }

        fn upload_directory(&self, upload_type: UploadType) -> &str {
            match upload_type {
                UploadType::Clients => "index_uploads",
                UploadType::Contacts => "contacts_uploads",
                UploadType::Results => "results_uploads",
            }
        }

        fn identifier_column(&self, upload_type: UploadType) -> &str {
            match upload_type {
                UploadType::Clients => "ctc_number",
                UploadType::Contacts | UploadType::Results => "index_ctc_number",
            }
        }

        fn emit_label_row(&self) -> bool {
            true
        }

        fn drop_first_rejected(&self) -> bool {
            self.drop_first_rejected
        }
    }

    fn caller() -> CallerIdentity {
        CallerIdentity::new("P1", "North", "T9", "L3")
    }

    fn orchestrator(
        reference: StaticReference,
        drop_first_rejected: bool,
    ) -> (
        UploadOrchestrator<MockStorage, StaticReference, MockConfig>,
        MockStorage,
    ) {
        let storage = MockStorage::new();
        let orchestrator = UploadOrchestrator::new(
            storage.clone(),
            reference,
            MockConfig {
                drop_first_rejected,
            },
        );
        (orchestrator, storage)
    }

    const CLIENTS_CSV: &str = "name,ctc_number\nAnn,CTC100\nBob,CTC101\n";

    #[tokio::test]
    async fn test_clients_duplicate_reported() {
        let (orchestrator, storage) = orchestrator(StaticReference::known(&["CTC100"]), false);

        let report = orchestrator
            .handle_upload(CLIENTS_CSV.as_bytes(), "batch_clients_001.csv", &caller())
            .await
            .unwrap();

        assert_eq!(report.upload_type, UploadType::Clients);
        assert_eq!(report.accepted_count, 1);
        assert!(report.rejected);
        assert_eq!(report.rejected_rows.len(), 1);
        assert_eq!(report.rejected_rows[0].row.get_named("ctc_number"), Some("CTC100"));
        assert_eq!(
            report.rejected_rows[0].reason,
            "Duplicate identifier in clients file"
        );

        let csv = storage
            .get_file("index_uploads/batch_clients_001.csv")
            .await
            .unwrap();
        let csv = String::from_utf8(csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            r#""name","ctc_number","providerId","team","teamId","locationId""#
        );
        assert_eq!(lines[1], lines[0]);
        assert_eq!(lines[2], r#""Bob","CTC101","P1","North","T9","L3""#);
    }

    #[tokio::test]
    async fn test_legacy_flag_drops_first_rejected_row() {
        let (orchestrator, _storage) = orchestrator(StaticReference::known(&["CTC100"]), true);

        let report = orchestrator
            .handle_upload(CLIENTS_CSV.as_bytes(), "batch_clients_001.csv", &caller())
            .await
            .unwrap();

        assert!(report.rejected);
        assert!(report.rejected_rows.is_empty());
    }

    #[tokio::test]
    async fn test_every_row_lands_in_exactly_one_bucket() {
        let (orchestrator, _storage) =
            orchestrator(StaticReference::known(&["C1", "C3"]), false);
        let csv = "name,index_ctc_number\na,C1\nb,C2\nc,C3\nd,C4\ne,C5\n";

        let report = orchestrator
            .handle_upload(csv.as_bytes(), "site_contacts_7.csv", &caller())
            .await
            .unwrap();

        assert_eq!(report.accepted_count, 2);
        assert_eq!(report.rejected_rows.len(), 3);
        assert_eq!(report.accepted_count + report.rejected_rows.len(), 5);
        assert!(report.rejected_rows.iter().all(|r| r.reason
            == "No matching index client identifier in contacts file"));
    }

    #[tokio::test]
    async fn test_no_matches_writes_nothing() {
        let (orchestrator, storage) = orchestrator(StaticReference::known(&["CTC100"]), true);
        let csv = "name,index_ctc_number\na,X1\nb,X2\n";

        let result = orchestrator
            .handle_upload(csv.as_bytes(), "batch_contacts_002.csv", &caller())
            .await;

        assert!(matches!(result, Err(UploadError::NoAcceptableRows)));
        assert_eq!(storage.file_count().await, 0);
    }

    #[tokio::test]
    async fn test_upstream_failure_aborts_before_reading() {
        let (orchestrator, storage) = orchestrator(StaticReference::unavailable(), true);

        // Non-UTF-8 input would error if it were read.
        let result = orchestrator
            .handle_upload(b"a,b\n\xff\xfe,2\n", "batch_clients_001.csv", &caller())
            .await;

        assert!(matches!(
            result,
            Err(UploadError::UpstreamUnavailable { .. })
        ));
        assert_eq!(orchestrator.reference.calls.load(Ordering::SeqCst), 1);
        assert_eq!(storage.file_count().await, 0);
    }

    #[tokio::test]
    async fn test_invalid_type_surfaces_after_stream() {
        let (orchestrator, storage) = orchestrator(StaticReference::known(&[]), true);

        let result = orchestrator
            .handle_upload(CLIENTS_CSV.as_bytes(), "batch_invoices_001.csv", &caller())
            .await;

        match result {
            Err(UploadError::InvalidUploadType { value }) => assert_eq!(value, "invoices"),
            other => panic!("expected invalid upload type, got {:?}", other),
        }
        assert_eq!(storage.file_count().await, 0);
    }

    #[tokio::test]
    async fn test_invalid_type_with_empty_file_reports_no_rows_first() {
        let (orchestrator, _storage) = orchestrator(StaticReference::known(&[]), true);

        let result = orchestrator
            .handle_upload(b"name,ctc_number\n", "batch_invoices_001.csv", &caller())
            .await;

        assert!(matches!(result, Err(UploadError::NoAcceptableRows)));
    }

    #[tokio::test]
    async fn test_empty_file_has_no_acceptable_rows() {
        let (orchestrator, _storage) = orchestrator(StaticReference::known(&[]), true);

        let result = orchestrator
            .handle_upload(b"", "batch_clients_001.csv", &caller())
            .await;

        assert!(matches!(result, Err(UploadError::NoAcceptableRows)));
    }

    #[tokio::test]
    async fn test_missing_column_is_schema_mismatch() {
        let (orchestrator, _storage) = orchestrator(StaticReference::known(&[]), true);

        let result = orchestrator
            .handle_upload(b"name,ctc\nAnn,1\n", "batch_results_001.csv", &caller())
            .await;

        assert!(matches!(result, Err(UploadError::SchemaMismatch { .. })));
    }

    #[tokio::test]
    async fn test_missing_file_request() {
        let (orchestrator, _storage) = orchestrator(StaticReference::known(&[]), true);

        let result = orchestrator.handle_request(None, &caller()).await;

        assert!(matches!(result, Err(UploadError::MissingFile)));
        assert_eq!(orchestrator.reference.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_request_with_file() {
        let (orchestrator, storage) = orchestrator(StaticReference::known(&["C1"]), true);
        let file = UploadFile::new("lab_results_9.csv", "index_ctc_number,result\nC1,neg\n");

        let report = orchestrator
            .handle_request(Some(file), &caller())
            .await
            .unwrap();

        assert_eq!(report.output_path, "results_uploads/lab_results_9.csv");
        assert!(!report.rejected);
        assert!(storage
            .get_file("results_uploads/lab_results_9.csv")
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_large_input_streams_through() {
        let (orchestrator, _storage) = orchestrator(StaticReference::known(&["ID0"]), false);
        let mut csv = String::from("ctc_number\n");
        for i in 0..5000 {
            csv.push_str(&format!("ID{}\n", i));
        }

        let report = orchestrator
            .handle_upload_reader(csv.as_bytes(), "bulk_clients_big.csv", &caller())
            .await
            .unwrap();

        assert_eq!(report.accepted_count, 4999);
        assert_eq!(report.rejected_rows.len(), 1);
    }

    #[tokio::test]
    async fn test_ragged_rows_are_aligned_to_header() {
        let (orchestrator, storage) = orchestrator(StaticReference::known(&["C1"]), false);
        // Second row is short, third row carries an extra trailing field.
        let csv = "name,index_ctc_number,note\na,C1,x\nb,C1\nc,C1,y,extra\nd\n";

        let report = orchestrator
            .handle_upload(csv.as_bytes(), "site_contacts_3.csv", &caller())
            .await
            .unwrap();

        assert_eq!(report.accepted_count, 3);
        assert_eq!(report.rejected_rows.len(), 1);
        assert_eq!(report.rejected_rows[0].row.values(), ["d", "", ""]);

        let csv = storage
            .get_file("contacts_uploads/site_contacts_3.csv")
            .await
            .unwrap();
        let csv = String::from_utf8(csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[3], r#""b","C1","","P1","North","T9","L3""#);
        assert_eq!(lines[4], r#""c","C1","y","P1","North","T9","L3""#);
    }

    /// Generates a clients CSV lazily and counts the data rows handed out.
    struct CountingReader {
        pending: Vec<u8>,
        next_row: usize,
        total_rows: usize,
        emitted: Arc<AtomicUsize>,
        started: Arc<tokio::sync::Notify>,
        notify_after: usize,
    }

    impl CountingReader {
        fn new(
            total_rows: usize,
            notify_after: usize,
        ) -> (Self, Arc<AtomicUsize>, Arc<tokio::sync::Notify>) {
            let emitted = Arc::new(AtomicUsize::new(0));
            let started = Arc::new(tokio::sync::Notify::new());
            let reader = Self {
                pending: b"ctc_number\n".to_vec(),
                next_row: 0,
                total_rows,
                emitted: emitted.clone(),
                started: started.clone(),
                notify_after,
            };
            (reader, emitted, started)
        }
    }

    impl Read for CountingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pending.is_empty() {
                if self.next_row == self.total_rows {
                    return Ok(0);
                }
                self.pending = format!("ID{}\n", self.next_row).into_bytes();
                self.next_row += 1;
                self.emitted.store(self.next_row, Ordering::SeqCst);
                if self.next_row == self.notify_after {
                    self.started.notify_one();
                }
            }
            let n = buf.len().min(self.pending.len());
            buf[..n].copy_from_slice(&self.pending[..n]);
            self.pending.drain(..n);
            Ok(n)
        }
    }

    #[tokio::test]
    async fn test_aborted_upload_stops_reading_and_writes_nothing() {
        const TOTAL_ROWS: usize = 1_000_000;
        let (orchestrator, storage) = orchestrator(StaticReference::known(&[]), false);
        let orchestrator = Arc::new(orchestrator);
        let (reader, emitted, started) = CountingReader::new(TOTAL_ROWS, ROWS_PER_YIELD + 1);

        let task = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                orchestrator
                    .handle_upload_reader(reader, "bulk_clients_big.csv", &caller())
                    .await
            })
        };

        started.notified().await;
        task.abort();
        let joined = task.await;

        assert!(joined.unwrap_err().is_cancelled());
        let read_rows = emitted.load(Ordering::SeqCst);
        assert!(read_rows < TOTAL_ROWS, "read {} rows", read_rows);
        assert_eq!(storage.file_count().await, 0);
    }
}
