use std::{
    fmt::{Debug, Formatter},
    rc::Rc,
};

use snafu::{OptionExt, ResultExt, Snafu};
use url::Url;

use crate::{
    config::ApiEndpoints,
    controller::SessionController,
    error::SessionError,
    identity::IdentityClient,
    transport::{HttpTransport, TransportError},
};

/// Errors local to a single request. They never change the session state by themselves.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RequestError {
    #[snafu(display("RequestError: Not authenticated"))]
    NotAuthenticated,

    /// The token could not be refreshed or was rejected again after refreshing.
    /// The session was demoted to unauthenticated. The user has to log in again.
    #[snafu(display("RequestError: Authentication expired"))]
    AuthenticationExpired,

    #[snafu(display("RequestError: Request failed"))]
    RequestFailed { source: TransportError },

    #[snafu(display("RequestError: '{resource_id}' does not name a valid resource"))]
    InvalidResource {
        resource_id: String,
        source: url::ParseError,
    },

    #[snafu(display("RequestError: Unexpected payload: {reason}"))]
    InvalidPayload { reason: String },
}

/// How often a request rejected with 401 is repeated after refreshing the token.
const RETRY_BUDGET: u8 = 1;

/// A request to a protected resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedRequest {
    pub resource_id: String,
    pub url: Url,

    /// `0` for the initial attempt, `1` for the single retry.
    pub retry_count: u8,
}

impl ProtectedRequest {
    pub fn new(resource_id: impl Into<String>, url: Url) -> Self {
        Self {
            resource_id: resource_id.into(),
            url,
            retry_count: 0,
        }
    }

    /// The follow-up attempt, or `None` if the retry budget is exhausted.
    pub fn retry(&self) -> Option<Self> {
        match self.retry_count < RETRY_BUDGET {
            true => Some(Self {
                retry_count: self.retry_count + 1,
                ..self.clone()
            }),
            false => None,
        }
    }
}

/// Performs requests against protected resources with automatic access token injection and a
/// single token refresh on 401 responses.
///
/// When a 401 occurs despite having a non-expired token, it could mean that the token was
/// revoked, rotated or expired between the last age check and the request. We refresh the token
/// (joining any refresh already in flight) and retry the request exactly once. A second 401 is
/// never retried, so a token the resource server keeps rejecting can not lead to a loop.
pub struct AuthorizedRequestExecutor<I: IdentityClient, T: HttpTransport> {
    controller: SessionController<I>,
    transport: Rc<T>,
    endpoints: ApiEndpoints,
}

impl<I: IdentityClient, T: HttpTransport> Clone for AuthorizedRequestExecutor<I, T> {
    fn clone(&self) -> Self {
        Self {
            controller: self.controller.clone(),
            transport: Rc::clone(&self.transport),
            endpoints: self.endpoints.clone(),
        }
    }
}

impl<I: IdentityClient, T: HttpTransport> Debug for AuthorizedRequestExecutor<I, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizedRequestExecutor")
            .field("controller", &self.controller)
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

impl<I: IdentityClient, T: HttpTransport> AuthorizedRequestExecutor<I, T> {
    pub fn new(controller: SessionController<I>, transport: Rc<T>, endpoints: ApiEndpoints) -> Self {
        Self {
            controller,
            transport,
            endpoints,
        }
    }

    pub fn endpoints(&self) -> &ApiEndpoints {
        &self.endpoints
    }

    /// Fetches the resource `resource_id` using the current access token.
    ///
    /// # Errors
    /// - `NotAuthenticated` if the session is not authenticated. No request is sent.
    /// - `AuthenticationExpired` if the token could not be refreshed after a 401, or the request
    ///   was rejected with 401 again after refreshing.
    /// - `RequestFailed` for any other failure. The session state is left untouched.
    pub async fn execute(&self, resource_id: &str) -> Result<serde_json::Value, RequestError> {
        if !self.controller.state().is_authenticated() {
            tracing::debug!(resource_id, "Not authenticated. Not sending request.");
            return NotAuthenticatedSnafu.fail();
        }

        let url = self
            .endpoints
            .resolve(resource_id)
            .context(InvalidResourceSnafu { resource_id })?;

        self.send(ProtectedRequest::new(resource_id, url)).await
    }

    async fn send(&self, mut request: ProtectedRequest) -> Result<serde_json::Value, RequestError> {
        let min_validity = self.controller.options().advanced.min_validity_seconds;

        loop {
            let access_token = self
                .controller
                .current_token()
                .context(NotAuthenticatedSnafu)?;

            tracing::trace!(
                resource_id = %request.resource_id,
                retry_count = request.retry_count,
                "Sending authorized request."
            );
            let err = match self.transport.get(&request.url, Some(&access_token)).await {
                Ok(payload) => return Ok(payload),
                Err(err) => err,
            };

            if !err.is_unauthorized() {
                return Err(err).context(RequestFailedSnafu);
            }

            let Some(retry) = request.retry() else {
                tracing::warn!(
                    resource_id = %request.resource_id,
                    "Request was rejected again after refreshing the token. Logging user out."
                );
                self.controller.expire(SessionError::TokenRejected);
                return AuthenticationExpiredSnafu.fail();
            };

            match self.controller.refresh_if_needed(min_validity).await {
                outcome if outcome.allows_retry() => {
                    tracing::debug!(?outcome, "Retrying request after 401.");
                    request = retry;
                }
                _ => return AuthenticationExpiredSnafu.fail(),
            }
        }
    }
}
