use crate::state::SessionState;
use snafu::Snafu;

/// Failure reported by the identity provider client.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum IdentityError {
    #[snafu(display("IdentityError: '{operation}' was rejected: {reason}"))]
    Rejected {
        operation: &'static str,
        reason: String,
    },

    /// The provider reported success but exposes no usable token (or no `exp` claim for it).
    #[snafu(display("IdentityError: No usable token available"))]
    MissingToken,
}

/// Authentication-state errors. These are always reflected in the shared session state.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SessionError {
    #[snafu(display(
        "Failed to initialize the identity provider. Please try refreshing the page."
    ))]
    InitializationFailed { source: IdentityError },

    #[snafu(display("SessionError: Token refresh failed, please login again"))]
    AuthenticationExpired { source: IdentityError },

    /// The resource server rejected the token even after it was refreshed.
    #[snafu(display("SessionError: Token was rejected by the resource server"))]
    TokenRejected,

    #[snafu(display("SessionError: Not possible while the session is {state:?}"))]
    NotReady { state: SessionState },

    #[snafu(display("SessionError: Already authenticated"))]
    AlreadyAuthenticated,

    #[snafu(display("SessionError: Could not start login"))]
    LoginFailed { source: IdentityError },
}
