//! @ai:module:intent Vendor-hosted batch submission and result download
//! @ai:module:layer infrastructure
//! @ai:module:public_api BatchTransport, AnyTransport, ensure_success
//! @ai:module:stateless false

use crate::batch::anthropic::AnthropicBatch;
use crate::batch::gemini::GeminiBatch;
use crate::batch::openai::OpenAiBatch;
use crate::batch::provider::ProviderFamily;
use crate::config::HarnessConfig;
use crate::error::{Error, Result};
use std::path::Path;

/// @ai:intent Trait for the network half of a provider's batch API
#[allow(async_fn_in_trait)]
pub trait BatchTransport: Send + Sync {
    /// @ai:intent Upload a JSONL batch file and start the job
    /// @ai:post returns the opaque job handle used by fetch_results
    /// @ai:effects network
    async fn submit(&self, path: &Path, model: &str) -> Result<String>;

    /// @ai:intent Download the raw JSONL results of a finished job
    /// @ai:post Err(BatchNotReady) while the job is still running
    /// @ai:effects network
    async fn fetch_results(&self, handle: &str) -> Result<String>;
}

/// @ai:intent Transport chosen at runtime from the model's provider family
pub enum AnyTransport {
    OpenAi(OpenAiBatch),
    Anthropic(AnthropicBatch),
    Gemini(GeminiBatch),
}

impl AnyTransport {
    /// @ai:intent Build the transport for a family from config and environment credentials
    /// @ai:pre the family's API key (or Google access token) is set in the environment
    /// @ai:effects env
    pub fn for_family(family: ProviderFamily, config: &HarnessConfig) -> Result<Self> {
        match family {
            ProviderFamily::OpenAi => Ok(AnyTransport::OpenAi(OpenAiBatch::new(&config.api)?)),
            ProviderFamily::Anthropic => {
                Ok(AnyTransport::Anthropic(AnthropicBatch::new(&config.api)?))
            }
            ProviderFamily::Gemini => Ok(AnyTransport::Gemini(GeminiBatch::new(
                &config.google,
                &config.api,
            )?)),
        }
    }
}

impl BatchTransport for AnyTransport {
    async fn submit(&self, path: &Path, model: &str) -> Result<String> {
        match self {
            AnyTransport::OpenAi(t) => t.submit(path, model).await,
            AnyTransport::Anthropic(t) => t.submit(path, model).await,
            AnyTransport::Gemini(t) => t.submit(path, model).await,
        }
    }

    async fn fetch_results(&self, handle: &str) -> Result<String> {
        match self {
            AnyTransport::OpenAi(t) => t.fetch_results(handle).await,
            AnyTransport::Anthropic(t) => t.fetch_results(handle).await,
            AnyTransport::Gemini(t) => t.fetch_results(handle).await,
        }
    }
}

/// @ai:intent Turn a non-2xx HTTP response into Error::Api with the body text
/// @ai:effects network
pub async fn ensure_success(
    provider: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(Error::Api {
        provider,
        status: status.as_u16(),
        body,
    })
}

/// @ai:intent Read an API key from the environment
/// @ai:effects env
pub(crate) fn api_key(var: &str) -> Result<String> {
    std::env::var(var).map_err(|_| Error::Config(format!("{} not set in environment", var)))
}

/// @ai:intent Shared HTTP client with the configured request timeout
/// @ai:effects pure
pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?)
}
