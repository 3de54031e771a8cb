use http::StatusCode;
use snafu::Snafu;
use url::Url;

/// Failure of a single HTTP call.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum TransportError {
    #[snafu(display("TransportError: Received status {status}"))]
    Status { status: StatusCode },

    #[snafu(display("TransportError: Could not send request: {reason}"))]
    Network { reason: String },

    #[snafu(display("TransportError: Could not decode payload: {reason}"))]
    Decode { reason: String },
}

impl TransportError {
    /// Whether the resource server rejected our credentials (HTTP 401).
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, TransportError::Status { status } if *status == StatusCode::UNAUTHORIZED)
    }
}

/// Minimal HTTP capability needed to reach the resource server.
#[allow(async_fn_in_trait)]
pub trait HttpTransport: 'static {
    /// Performs a GET request, attaching `bearer_token` in an `AUTHORIZATION` header if given.
    ///
    /// # Errors
    /// Any non-2xx response is reported as `TransportError::Status`.
    async fn get(
        &self,
        url: &Url,
        bearer_token: Option<&str>,
    ) -> Result<serde_json::Value, TransportError>;
}

/// `HttpTransport` backed by a `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &Url,
        bearer_token: Option<&str>,
    ) -> Result<serde_json::Value, TransportError> {
        let mut req_builder = self.client.get(url.clone());
        if let Some(access_token) = bearer_token {
            req_builder = req_builder.bearer_auth(access_token);
        }

        let resp = req_builder.send().await.map_err(|err| {
            NetworkSnafu {
                reason: err.to_string(),
            }
            .build()
        })?;

        let status = resp.status();
        if !status.is_success() {
            tracing::debug!(%url, %status, "Request failed.");
            return StatusSnafu { status }.fail();
        }

        resp.json::<serde_json::Value>().await.map_err(|err| {
            DecodeSnafu {
                reason: err.to_string(),
            }
            .build()
        })
    }
}
