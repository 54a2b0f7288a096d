//! @ai:module:intent Provider-normalized batch client: write, submit, download, parse
//! @ai:module:layer application
//! @ai:module:public_api BatchClient
//! @ai:module:stateless false

use crate::batch::provider::{BatchCodec, LineOptions, ProviderFamily};
use crate::batch::request::{self, Postfix};
use crate::batch::transport::{AnyTransport, BatchTransport};
use crate::batch::types::{BatchItem, BatchJob, RetrievedBatch};
use crate::call_log::{CallLog, CallLogEntry};
use crate::config::{ApiConfig, HarnessConfig, PathConfig};
use crate::error::{Error, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// @ai:intent Batch client bound to one model and its provider family
pub struct BatchClient<T: BatchTransport> {
    family: ProviderFamily,
    options: LineOptions,
    transport: T,
    uploads_dir: PathBuf,
    downloads_dir: PathBuf,
    log: Arc<dyn CallLog>,
}

impl BatchClient<AnyTransport> {
    /// @ai:intent Create a client for a model with the transport its family needs
    /// @ai:pre provider credentials for the model's family are in the environment
    /// @ai:effects env
    pub fn from_config(model: &str, config: &HarnessConfig, log: Arc<dyn CallLog>) -> Result<Self> {
        let family = ProviderFamily::from_model(model)?;
        let transport = AnyTransport::for_family(family, config)?;
        Self::new(model, transport, &config.api, &config.paths, log)
    }
}

impl<T: BatchTransport> BatchClient<T> {
    /// @ai:intent Create a client over an explicit transport
    /// @ai:effects pure
    pub fn new(
        model: &str,
        transport: T,
        api: &ApiConfig,
        paths: &PathConfig,
        log: Arc<dyn CallLog>,
    ) -> Result<Self> {
        Ok(Self {
            family: ProviderFamily::from_model(model)?,
            options: LineOptions::for_model(model, api),
            transport,
            uploads_dir: paths.uploads_dir.clone(),
            downloads_dir: paths.downloads_dir.clone(),
            log,
        })
    }

    pub fn family(&self) -> ProviderFamily {
        self.family
    }

    pub fn model(&self) -> &str {
        &self.options.model
    }

    fn codec(&self) -> &'static dyn BatchCodec {
        self.family.codec()
    }

    /// @ai:intent Path of an upload or download file for a test run
    /// @ai:effects pure
    pub fn file_path(&self, testname: &str, postfix: Postfix) -> PathBuf {
        let dir = match postfix {
            Postfix::Upload1 | Postfix::Upload2 => &self.uploads_dir,
            Postfix::Download1 | Postfix::Download2 => &self.downloads_dir,
        };
        request::batch_file_path(dir, testname, postfix)
    }

    /// @ai:intent Validate items and write the provider-specific upload file
    /// @ai:effects fs:write
    pub fn write_batch(
        &self,
        testname: &str,
        postfix: Postfix,
        items: &[BatchItem],
    ) -> Result<PathBuf> {
        let path = request::write_batch_file(
            &self.uploads_dir,
            testname,
            postfix,
            self.codec(),
            &self.options,
            items,
        )?;

        info!(
            path = %path.display(),
            items = items.len(),
            model = %self.model(),
            "Wrote batch file"
        );
        Ok(path)
    }

    /// @ai:intent Submit a written upload file and log it
    /// @ai:effects network, fs:read, fs:write
    pub async fn submit(&self, path: &Path) -> Result<BatchJob> {
        let handle = self.transport.submit(path, self.model()).await?;

        let content = std::fs::read_to_string(path).map_err(|source| Error::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        self.log.record(&CallLogEntry::Note(format!(
            "Uploaded file {} against model {}\nbatch handle: {}\n{}",
            path.display(),
            self.model(),
            handle,
            content
        )))?;

        info!(handle = %handle, provider = %self.family, "Batch submitted");
        Ok(BatchJob {
            provider: self.family,
            handle,
            submitted_at: Utc::now(),
        })
    }

    /// @ai:intent Write then submit in one step
    /// @ai:effects network, fs:write
    pub async fn write_and_submit(
        &self,
        testname: &str,
        postfix: Postfix,
        items: &[BatchItem],
    ) -> Result<BatchJob> {
        let path = self.write_batch(testname, postfix, items)?;
        self.submit(&path).await
    }

    /// @ai:intent Fetch a finished job's results into the downloads directory
    /// @ai:post the file exists at file_path(testname, download postfix)
    /// @ai:effects network, fs:write
    pub async fn download(
        &self,
        handle: &str,
        testname: &str,
        postfix: Postfix,
    ) -> Result<PathBuf> {
        request::validate_test_name(testname)?;
        let content = self.transport.fetch_results(handle).await?;

        std::fs::create_dir_all(&self.downloads_dir)?;
        let path = self.file_path(testname, Postfix::download_for(postfix));
        std::fs::write(&path, &content)?;

        self.log.record(&CallLogEntry::Note(format!(
            "DOWNLOADED {} from model={} w/batch handle={}\n{}",
            path.display(),
            self.model(),
            handle,
            content
        )))?;

        info!(path = %path.display(), "Batch results downloaded");
        Ok(path)
    }

    /// @ai:intent Items of a previously written upload file
    /// @ai:effects fs:read
    pub fn read_upload(&self, testname: &str, postfix: Postfix) -> Result<Vec<BatchItem>> {
        request::read_batch_file(&self.file_path(testname, postfix), self.codec())
    }

    /// @ai:intent Parse a downloaded results file, cross-checking against the upload if present
    /// @ai:effects fs:read
    pub fn read_results(&self, testname: &str, upload: Postfix) -> Result<RetrievedBatch> {
        let path = self.file_path(testname, Postfix::download_for(upload));
        let batch = request::read_results_file(&path, self.codec())?;

        let upload_path = self.file_path(testname, upload);
        if upload_path.exists() {
            batch.cross_check(&self.read_upload(testname, upload)?)?;
        } else {
            warn!(
                path = %upload_path.display(),
                "Upload file missing, skipping identifier cross-check"
            );
        }

        Ok(batch)
    }

    /// @ai:intent Download and parse a finished job
    /// @ai:effects network, fs:read, fs:write
    pub async fn retrieve(
        &self,
        handle: &str,
        testname: &str,
        upload: Postfix,
    ) -> Result<RetrievedBatch> {
        self.download(handle, testname, upload).await?;
        let batch = self.read_results(testname, upload)?;

        info!(
            responses = batch.items.len(),
            input_tokens = batch.usage.input_tokens,
            reasoning_tokens = batch.usage.reasoning_tokens,
            output_tokens = batch.usage.output_tokens,
            "Batch retrieved"
        );
        Ok(batch)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::call_log::MemoryCallLog;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Transport that records submissions and serves canned results
    pub(crate) struct MockTransport {
        pub results: String,
        pub submitted: Mutex<Vec<PathBuf>>,
    }

    impl MockTransport {
        pub fn new(results: impl Into<String>) -> Self {
            Self {
                results: results.into(),
                submitted: Mutex::new(Vec::new()),
            }
        }
    }

    impl BatchTransport for MockTransport {
        async fn submit(&self, path: &Path, _model: &str) -> Result<String> {
            self.submitted.lock().unwrap().push(path.to_path_buf());
            Ok("batch_123".to_string())
        }

        async fn fetch_results(&self, handle: &str) -> Result<String> {
            if handle != "batch_123" {
                return Err(Error::BatchNotReady {
                    handle: handle.to_string(),
                    status: "in_progress".to_string(),
                });
            }
            Ok(self.results.clone())
        }
    }

    pub(crate) fn paths_in(temp: &TempDir) -> PathConfig {
        PathConfig {
            uploads_dir: temp.path().join("Batch_Uploads"),
            downloads_dir: temp.path().join("Batch_Downloads"),
            ..PathConfig::default()
        }
    }

    pub(crate) fn claude_result(id: &str, text: &str) -> String {
        serde_json::json!({
            "custom_id": id,
            "result": {
                "type": "succeeded",
                "message": {
                    "content": [{"type": "text", "text": text}],
                    "usage": {"input_tokens": 100, "output_tokens": 10}
                }
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_submit_and_retrieve() {
        let temp = TempDir::new().unwrap();
        let log = Arc::new(MemoryCallLog::new());
        let results = format!(
            "{}\n{}\n",
            claude_result("Strategy_1_Goal_1", "Yes"),
            claude_result("Strategy_1_Goal_2", "No.")
        );
        let client = BatchClient::new(
            "claude-opus-4-20250514",
            MockTransport::new(results),
            &ApiConfig::default(),
            &paths_in(&temp),
            log.clone(),
        )
        .unwrap();

        let items = vec![
            BatchItem::single("Strategy_1_Goal_1", "q1"),
            BatchItem::single("Strategy_1_Goal_2", "q2"),
        ];
        let job = client
            .write_and_submit("goal_test", Postfix::Upload1, &items)
            .await
            .unwrap();
        assert_eq!(job.handle, "batch_123");
        assert_eq!(job.provider, ProviderFamily::Anthropic);

        let batch = client
            .retrieve(&job.handle, "goal_test", Postfix::Upload1)
            .await
            .unwrap();
        assert_eq!(batch.items.len(), 2);
        assert_eq!(batch.usage.input_tokens, 200);
        assert!(client.file_path("goal_test", Postfix::Download1).exists());
        assert_eq!(log.entries().len(), 2);
    }

    #[tokio::test]
    async fn test_retrieve_rejects_unknown_identifier() {
        let temp = TempDir::new().unwrap();
        let client = BatchClient::new(
            "claude-sonnet-4-20250514",
            MockTransport::new(claude_result("Strategy_9_Goal_1", "Yes")),
            &ApiConfig::default(),
            &paths_in(&temp),
            Arc::new(MemoryCallLog::new()),
        )
        .unwrap();

        client
            .write_batch("t", Postfix::Upload1, &[BatchItem::single("Strategy_1_Goal_1", "q")])
            .unwrap();

        let err = client.retrieve("batch_123", "t", Postfix::Upload1).await.unwrap_err();
        assert!(matches!(err, Error::UnknownIdentifier(id) if id == "Strategy_9_Goal_1"));
    }

    #[tokio::test]
    async fn test_not_ready_batch_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let client = BatchClient::new(
            "gpt-4.1",
            MockTransport::new(""),
            &ApiConfig::default(),
            &paths_in(&temp),
            Arc::new(MemoryCallLog::new()),
        )
        .unwrap();

        let err = client.download("other", "t", Postfix::Upload1).await.unwrap_err();
        assert!(matches!(err, Error::BatchNotReady { .. }));
        assert!(!client.file_path("t", Postfix::Download1).exists());
    }
}
