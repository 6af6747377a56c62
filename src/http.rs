use crate::error::{require_non_blank, ConfigError, TransportError};
use crate::sink::LogTransport;
use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use std::collections::BTreeMap;
use std::error::Error;
use tokio_util::sync::CancellationToken;

/// Path of the Dynatrace log ingest API below an environment URL.
pub const INGEST_PATH: &str = "/api/v2/logs/ingest";

const JSON_UTF8: &str = "application/json; charset=utf-8";

/// Build the ingest endpoint for an environment URL such as
/// `https://abc12345.live.dynatrace.com`. URLs that already point at the
/// ingest API are returned unchanged.
pub fn ingest_endpoint(environment_url: &str) -> String {
    let base = environment_url.trim().trim_end_matches('/');
    if base.ends_with(INGEST_PATH) {
        base.to_string()
    } else {
        format!("{}{}", base, INGEST_PATH)
    }
}

/// HTTP client for the Dynatrace log ingest API.
///
/// Every request carries `Authorization: Api-Token <token>` and a
/// `application/json; charset=utf-8` content type.
#[derive(Clone)]
pub struct DynatraceHttpClient {
    client: Client,
    authorization: HeaderValue,
}

impl DynatraceHttpClient {
    /// Create a client authenticating with `access_token`.
    ///
    /// **Errors**
    /// - [`ConfigError::Blank`] if the token is empty or whitespace.
    /// - [`ConfigError::InvalidHeader`] if the token cannot be sent as a
    ///   header value.
    pub fn new(access_token: &str) -> Result<Self, ConfigError> {
        require_non_blank("access_token", access_token)?;

        let mut authorization = HeaderValue::from_str(&format!("Api-Token {}", access_token))
            .map_err(|_| ConfigError::InvalidHeader("access_token"))?;
        authorization.set_sensitive(true);

        Ok(Self {
            client: Client::new(),
            authorization,
        })
    }

    /// Reserved for future use.
    pub fn configure(&mut self, _settings: &BTreeMap<String, String>) {}

    /// POST `body` to `request_uri`.
    ///
    /// **Returns**
    /// - the response status, whatever it is; interpreting it is up to the
    ///   caller.
    ///
    /// **Errors**
    /// - [`TransportError::InvalidUri`] for a blank URI, before any I/O.
    /// - [`TransportError::Cancelled`] if `cancel` fires first.
    /// - [`TransportError::Http`] on connection or protocol errors.
    pub async fn post(
        &self,
        request_uri: &str,
        body: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<StatusCode, TransportError> {
        if request_uri.trim().is_empty() {
            return Err(TransportError::InvalidUri);
        }

        let request = self
            .client
            .post(request_uri)
            .header(AUTHORIZATION, self.authorization.clone())
            .header(CONTENT_TYPE, JSON_UTF8)
            .body(body)
            .send();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            resp = request => Ok(resp?.status()),
        }
    }
}

/// [`LogTransport`] posting batches to one Dynatrace ingest endpoint.
#[derive(Clone)]
pub struct DynatraceTransport {
    client: DynatraceHttpClient,
    endpoint: String,
    cancel: CancellationToken,
}

impl DynatraceTransport {
    pub fn new(client: DynatraceHttpClient, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Token that aborts in-flight requests when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

#[async_trait]
impl LogTransport for DynatraceTransport {
    async fn send_batch(&self, body: Vec<u8>) -> Result<(), Box<dyn Error + Send + Sync>> {
        let status = self.client.post(&self.endpoint, body, &self.cancel).await?;
        if status.is_success() {
            Ok(())
        } else {
            Err(format!("Dynatrace log ingest failed with status {}", status).into())
        }
    }
}
