use std::rc::Rc;

use futures::future::LocalBoxFuture;
use jsonwebtoken::{DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::{
    AccessToken,
    config::{InitOptions, LogoutOptions},
    error::IdentityError,
};

/// Callback the identity provider invokes once it considers the current token expired.
/// Implementations drive the returned future to completion on their local executor.
pub type ExpiryHandler = Rc<dyn Fn() -> LocalBoxFuture<'static, ()>>;

/// The identity provider client (e.g. a keycloak-js instance) as seen by this crate.
///
/// Everything protocol related (redirects, PKCE, silent SSO checks) happens behind this trait.
/// All futures are polled on a single thread, so implementations are not required to be `Send`.
#[allow(async_fn_in_trait)]
pub trait IdentityClient: 'static {
    /// Checks for an existing session. Resolves to whether the user is authenticated.
    async fn init(&self, options: &InitOptions) -> Result<bool, IdentityError>;

    /// Redirects to the login page.
    async fn login(&self) -> Result<(), IdentityError>;

    /// Redirects to the logout endpoint.
    async fn logout(&self, options: &LogoutOptions) -> Result<(), IdentityError>;

    /// Refreshes the token if it expires within `min_validity_seconds`.
    /// Resolves to `true` if a new token was issued, `false` if the current one is still valid.
    async fn update_token(
        &self,
        min_validity_seconds: u32,
    ) -> Result<bool, IdentityError>;

    /// The current raw access token.
    fn token(&self) -> Option<AccessToken>;

    /// Decoded claims of the current access token.
    fn token_parsed(&self) -> Option<ParsedToken> {
        let token = self.token()?;
        match ParsedToken::decode_unverified(&token) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                tracing::warn!(?err, "Could not decode claims of the current access token.");
                None
            }
        }
    }

    /// Estimated difference between our clock and the provider's clock, in seconds.
    /// `None` until the provider had a chance to compute it.
    fn time_skew(&self) -> Option<i64>;

    /// Install (or, with `None`, remove) the expiry notification handler.
    fn set_on_token_expired(&self, handler: Option<ExpiryHandler>);
}

/// The subset of access token claims relevant for session handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedToken {
    /// (exp) Expiration time, seconds since the unix epoch.
    pub exp: i64,

    /// (iat) Time at which the token was issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// (sub) Subject identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// KEYCLOAK SPECIFIC. Preferred username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
}

impl ParsedToken {
    /// Decodes the payload of a JWT without verifying its signature.
    ///
    /// The token was handed to us by the identity provider and is only ever sent back to
    /// resource servers, which do the verification. We only read its expiry.
    pub fn decode_unverified(token: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        jsonwebtoken::decode::<ParsedToken>(token, &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims)
    }
}
