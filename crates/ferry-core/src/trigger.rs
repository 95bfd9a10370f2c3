//! Remote trigger calls over HTTP.

use std::time::Duration;

use anyhow::Context;
use url::Url;

use crate::error::TriggerError;
use crate::transport::DeploymentTarget;

/// Status and body of a trigger call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into an error.
    pub fn error_for_status(self, url: &Url) -> Result<Self, TriggerError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(TriggerError::Status {
                url: url.to_string(),
                status: self.status,
                body: self.body,
            })
        }
    }
}

/// Blocking HTTP GET against a remote endpoint.
pub trait TriggerClient {
    fn invoke(&self, url: &Url) -> Result<HttpResponse, TriggerError>;
}

/// `reqwest` backed trigger client.
///
/// The async client is driven to completion on a private runtime so the
/// pipeline stays strictly sequential.
pub struct HttpTrigger {
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

impl HttpTrigger {
    /// Build a client. `timeout` bounds each request; `None` waits forever.
    pub fn new(timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut builder =
            reqwest::Client::builder().user_agent(concat!("ferry/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to build HTTP client")?;
        let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
        Ok(Self { client, runtime })
    }

    async fn fetch(&self, url: &Url) -> Result<HttpResponse, TriggerError> {
        let request_failed = |e: reqwest::Error| TriggerError::Request {
            url: url.to_string(),
            cause: e.to_string(),
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(request_failed)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(request_failed)?;
        Ok(HttpResponse { status, body })
    }
}

impl TriggerClient for HttpTrigger {
    fn invoke(&self, url: &Url) -> Result<HttpResponse, TriggerError> {
        self.runtime.block_on(self.fetch(url))
    }
}

/// URL of the uploaded bootstrap script.
pub fn bootstrap_url(target: &DeploymentTarget, script_name: &str) -> Result<Url, TriggerError> {
    base_url(target)?
        .join(script_name)
        .map_err(|e| TriggerError::InvalidUrl(format!("{}: {}", script_name, e)))
}

/// URL of the migration endpoint: `<path>?hash=<token>&<flag>&<flag>`.
///
/// Flags are bare query keys, as the endpoint checks for their presence.
pub fn migration_url(
    target: &DeploymentTarget,
    path: &str,
    token: &str,
    flags: &[String],
) -> Result<Url, TriggerError> {
    let mut url = base_url(target)?
        .join(path.trim_start_matches('/'))
        .map_err(|e| TriggerError::InvalidUrl(format!("{}: {}", path, e)))?;

    let mut query = format!("hash={}", token);
    for flag in flags {
        query.push('&');
        query.push_str(flag);
    }
    url.set_query(Some(&query));
    Ok(url)
}

fn base_url(target: &DeploymentTarget) -> Result<Url, TriggerError> {
    let raw = format!("{}://{}/", target.scheme, target.hostname.trim_end_matches('/'));
    Url::parse(&raw).map_err(|e| TriggerError::InvalidUrl(format!("{}: {}", raw, e)))
}
