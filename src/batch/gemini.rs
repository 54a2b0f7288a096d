//! @ai:module:intent Gemini-like batch lines, prediction parsing and the Vertex AI + GCS transport
//! @ai:module:layer infrastructure
//! @ai:module:public_api GeminiCodec, GeminiBatch, output_object_key
//! @ai:module:stateless false

use crate::batch::provider::{BatchCodec, LineOptions, ParsedLine};
use crate::batch::transport::{api_key, ensure_success, http_client, BatchTransport};
use crate::batch::types::{BatchItem, ResponseItem, Role, TokenUsage, Turn};
use crate::config::{ApiConfig, GoogleConfig};
use crate::error::{Error, Result};
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

const PROVIDER: &str = "Gemini";
const INPUT_PREFIX: &str = "gemini_input";
const OUTPUT_PREFIX: &str = "gemini_output";
const PREDICTIONS_FILE: &str = "predictions.jsonl";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RequestLine {
    key: String,
    request: GenerateRequest,
}

#[derive(Debug, Deserialize)]
struct PredictionLine {
    key: String,
    #[serde(default)]
    request: Option<GenerateRequest>,
    #[serde(default)]
    response: Option<GenerateResponse>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    candidates: Vec<Candidate>,
    usage_metadata: UsageMetadata,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Content,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
    #[serde(default)]
    thoughts_token_count: u64,
}

fn content_from_turn(turn: &Turn) -> Content {
    let role = match turn.role {
        Role::User => "user",
        Role::Assistant => "model",
    };

    Content {
        role: role.to_string(),
        parts: vec![Part {
            text: turn.text.clone(),
        }],
    }
}

fn turn_from_content(identifier: &str, content: Content) -> Result<Turn> {
    let unsupported = |reason: String| Error::UnsupportedConversation {
        identifier: identifier.to_string(),
        reason,
    };

    let role = Role::from_label(&content.role, "model", identifier)?;

    let mut parts = content.parts.into_iter();
    match (parts.next(), parts.next()) {
        (Some(part), None) => Ok(Turn {
            role,
            text: part.text,
        }),
        _ => Err(unsupported("expected exactly one text part per turn".to_string())),
    }
}

fn item_from_request(identifier: String, request: GenerateRequest) -> Result<BatchItem> {
    let conversation = request
        .contents
        .into_iter()
        .map(|c| turn_from_content(&identifier, c))
        .collect::<Result<Vec<_>>>()?;

    Ok(BatchItem {
        identifier,
        conversation,
    })
}

/// @ai:intent Codec for `{key, request:{contents}}` Vertex batch prediction lines
pub struct GeminiCodec;

impl BatchCodec for GeminiCodec {
    fn serialize_line(&self, item: &BatchItem, _options: &LineOptions) -> Result<String> {
        let line = RequestLine {
            key: item.identifier.clone(),
            request: GenerateRequest {
                contents: item.conversation.iter().map(content_from_turn).collect(),
            },
        };

        Ok(serde_json::to_string(&line)?)
    }

    fn parse_request_line(&self, line: &str) -> Result<BatchItem> {
        let parsed: RequestLine = serde_json::from_str(line)?;
        item_from_request(parsed.key, parsed.request)
    }

    fn parse_result_line(&self, line_no: usize, line: &str) -> Result<ParsedLine> {
        let parsed: PredictionLine = serde_json::from_str(line)
            .map_err(|e| Error::malformed(PROVIDER, line_no, e.to_string()))?;

        if let Some(status) = parsed.status.as_deref().filter(|s| !s.is_empty()) {
            return Err(Error::malformed(
                PROVIDER,
                line_no,
                format!("{}: prediction failed: {}", parsed.key, status),
            ));
        }

        let response = parsed
            .response
            .ok_or_else(|| Error::malformed(PROVIDER, line_no, "missing response"))?;

        let candidate = match response.candidates.as_slice() {
            [candidate] => candidate,
            other => {
                return Err(Error::malformed(
                    PROVIDER,
                    line_no,
                    format!("expected 1 candidate, got {}", other.len()),
                ))
            }
        };

        if candidate.finish_reason.as_deref() != Some("STOP") {
            return Err(Error::malformed(
                PROVIDER,
                line_no,
                format!("finish reason is {:?}", candidate.finish_reason),
            ));
        }

        let text = match candidate.content.parts.as_slice() {
            [part] => part.text.clone(),
            other => {
                return Err(Error::malformed(
                    PROVIDER,
                    line_no,
                    format!("expected 1 part, got {}", other.len()),
                ))
            }
        };

        let echoed_request = parsed
            .request
            .map(|request| item_from_request(parsed.key.clone(), request))
            .transpose()?;

        Ok(ParsedLine {
            response: ResponseItem {
                identifier: parsed.key,
                text,
                usage: TokenUsage {
                    input_tokens: response.usage_metadata.prompt_token_count,
                    reasoning_tokens: response.usage_metadata.thoughts_token_count,
                    output_tokens: response.usage_metadata.candidates_token_count,
                },
            },
            echoed_request,
        })
    }
}

/// @ai:intent Object key of the predictions file inside a job's gs:// output directory
/// @ai:pre output_dir is gs://<bucket>/<prefix>
/// @ai:effects pure
pub fn output_object_key(output_dir: &str, bucket: &str) -> Result<String> {
    let location = output_dir
        .strip_prefix("gs://")
        .and_then(|rest| rest.strip_prefix(bucket))
        .and_then(|rest| rest.strip_prefix('/'))
        .ok_or_else(|| {
            Error::malformed(
                PROVIDER,
                0,
                format!("output directory {} is not inside bucket {}", output_dir, bucket),
            )
        })?;

    Ok(format!(
        "{}/{}",
        location.trim_end_matches('/'),
        PREDICTIONS_FILE
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateJobRequest {
    display_name: String,
    model: String,
    input_config: InputConfig,
    output_config: OutputConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InputConfig {
    instances_format: &'static str,
    gcs_source: GcsSource,
}

#[derive(Debug, Serialize)]
struct GcsSource {
    uris: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutputConfig {
    predictions_format: &'static str,
    gcs_destination: GcsDestination,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GcsDestination {
    output_uri_prefix: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchPredictionJob {
    name: String,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    output_info: Option<OutputInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutputInfo {
    #[serde(default)]
    gcs_output_directory: Option<String>,
}

/// @ai:intent Vertex AI batch prediction transport staging files through a GCS bucket
pub struct GeminiBatch {
    client: reqwest::Client,
    store: Arc<dyn ObjectStore>,
    project: String,
    location: String,
    bucket: String,
    access_token: String,
}

impl GeminiBatch {
    /// @ai:intent Create a transport from config, GOOGLE_ACCESS_TOKEN and GCS credentials in the environment
    /// @ai:pre GOOGLE_ACCESS_TOKEN is set and location/bucket resolve from config or env
    /// @ai:effects env
    pub fn new(google: &GoogleConfig, api: &ApiConfig) -> Result<Self> {
        let bucket = google.resolved_bucket()?;
        let store = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(&bucket)
            .build()?;

        Ok(Self {
            client: http_client(api.request_timeout_secs)?,
            store: Arc::new(store),
            project: google.project.clone(),
            location: google.resolved_location()?,
            bucket,
            access_token: api_key("GOOGLE_ACCESS_TOKEN")?,
        })
    }

    /// @ai:intent Create a transport over an arbitrary object store
    /// @ai:effects pure
    pub fn with_store(
        store: Arc<dyn ObjectStore>,
        client: reqwest::Client,
        project: impl Into<String>,
        location: impl Into<String>,
        bucket: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            store,
            project: project.into(),
            location: location.into(),
            bucket: bucket.into(),
            access_token: access_token.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("https://{}-aiplatform.googleapis.com/v1", self.location)
    }

    /// @ai:intent Copy a local batch file to gemini_input/<file name>
    /// @ai:post returns the gs:// URI of the staged file
    /// @ai:effects fs:read, network
    pub async fn stage_input(&self, path: &Path) -> Result<String> {
        let bytes = std::fs::read(path).map_err(|source| Error::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| Error::Config(format!("{} has no file name", path.display())))?;

        let key = format!("{}/{}", INPUT_PREFIX, file_name);
        self.store
            .put(&ObjectPath::from(key.as_str()), PutPayload::from(bytes))
            .await?;

        Ok(format!("gs://{}/{}", self.bucket, key))
    }

    /// @ai:intent Read predictions.jsonl from a job's output directory
    /// @ai:effects network
    pub async fn read_predictions(&self, output_dir: &str) -> Result<String> {
        let key = output_object_key(output_dir, &self.bucket)?;
        let bytes = self
            .store
            .get(&ObjectPath::from(key.as_str()))
            .await?
            .bytes()
            .await?;

        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::malformed(PROVIDER, 0, format!("predictions are not UTF-8: {}", e)))
    }
}

impl BatchTransport for GeminiBatch {
    async fn submit(&self, path: &Path, model: &str) -> Result<String> {
        let source = self.stage_input(path).await?;
        let destination = format!("gs://{}/{}/", self.bucket, OUTPUT_PREFIX);

        let display_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| model.to_string());

        let request = CreateJobRequest {
            display_name,
            model: format!("publishers/google/models/{}", model),
            input_config: InputConfig {
                instances_format: "jsonl",
                gcs_source: GcsSource { uris: vec![source] },
            },
            output_config: OutputConfig {
                predictions_format: "jsonl",
                gcs_destination: GcsDestination {
                    output_uri_prefix: destination,
                },
            },
        };

        let response = self
            .client
            .post(format!(
                "{}/projects/{}/locations/{}/batchPredictionJobs",
                self.endpoint(),
                self.project,
                self.location
            ))
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await?;
        let job: BatchPredictionJob = ensure_success(PROVIDER, response).await?.json().await?;

        info!(job = %job.name, state = ?job.state, "Submitted Gemini batch prediction job");
        Ok(job.name)
    }

    async fn fetch_results(&self, handle: &str) -> Result<String> {
        let response = self
            .client
            .get(format!("{}/{}", self.endpoint(), handle))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let job: BatchPredictionJob = ensure_success(PROVIDER, response).await?.json().await?;

        let output_dir = job
            .output_info
            .and_then(|info| info.gcs_output_directory)
            .ok_or_else(|| Error::BatchNotReady {
                handle: handle.to_string(),
                status: job.state.clone().unwrap_or_else(|| "unknown".to_string()),
            })?;

        info!(output_dir = %output_dir, "Reading Gemini predictions");
        self.read_predictions(&output_dir).await
    }
}
