use crate::error::SessionError;

/// Lifecycle state of the session.
///
/// ```text
/// Uninitialized -> Initializing -> Authenticated | Unauthenticated | InitError
/// Authenticated -> Authenticated   (token refreshed)
/// Authenticated -> Unauthenticated (logout, or refresh failed)
/// ```
///
/// `Unauthenticated` and `InitError` are only left through an explicit login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Uninitialized,
    Initializing,
    Authenticated,
    Unauthenticated,
    InitError,
}

impl SessionState {
    pub fn is_authenticated(self) -> bool {
        matches!(self, SessionState::Authenticated)
    }

    /// `true` until the identity provider answered the initial session check.
    pub fn is_loading(self) -> bool {
        matches!(
            self,
            SessionState::Uninitialized | SessionState::Initializing
        )
    }

    /// Whether the identity provider client was successfully initialized.
    pub(crate) fn is_provider_ready(self) -> bool {
        matches!(
            self,
            SessionState::Authenticated | SessionState::Unauthenticated
        )
    }
}

/// Identifies one authentication session.
///
/// Not orderable. Two versions are only ever compared for equality, which still holds after the
/// counter wrapped around.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SessionVersion(u64);

impl SessionVersion {
    pub const ZERO: SessionVersion = SessionVersion(0);

    pub fn increment(self) -> Self {
        SessionVersion(self.0.wrapping_add(1))
    }
}

impl Default for SessionVersion {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Result of a token refresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The provider issued a new token. It is now held by the token store.
    Refreshed,

    /// The current token still had enough validity left. Nothing changed.
    StillValid,

    /// Refreshing was not possible. The session is (or already was) unauthenticated.
    Failed,
}

impl RefreshOutcome {
    /// Whether a request rejected with the previous token is worth retrying.
    pub fn allows_retry(self) -> bool {
        matches!(self, RefreshOutcome::Refreshed | RefreshOutcome::StillValid)
    }
}

/// Read-only view of the session, handed to observers after every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub version: SessionVersion,
    pub has_token: bool,
    pub expiry_epoch_seconds: Option<i64>,
    pub last_error: Option<SessionError>,
}

#[cfg(test)]
mod tests {
    use assertr::prelude::*;

    use super::*;

    #[test]
    fn session_version_default_is_zero() {
        assert_that(SessionVersion::default()).is_equal_to(SessionVersion::ZERO);
        assert_that(SessionVersion::ZERO).is_equal_to(SessionVersion(0));
    }

    #[test]
    fn session_version_increment() {
        let v = SessionVersion(0);
        assert_that(v.increment()).is_equal_to(SessionVersion(1));
    }

    #[test]
    fn session_version_increment_wraps_around() {
        let v = SessionVersion(u64::MAX);
        assert_that(v.increment()).is_equal_to(SessionVersion(0));
    }

    #[test]
    fn only_authenticated_is_authenticated() {
        assert_that(SessionState::Authenticated.is_authenticated()).is_true();
        assert_that(SessionState::Unauthenticated.is_authenticated()).is_false();
        assert_that(SessionState::InitError.is_authenticated()).is_false();
        assert_that(SessionState::Initializing.is_authenticated()).is_false();
    }

    #[test]
    fn loading_until_provider_answered() {
        assert_that(SessionState::default().is_loading()).is_true();
        assert_that(SessionState::Initializing.is_loading()).is_true();
        assert_that(SessionState::Unauthenticated.is_loading()).is_false();
        assert_that(SessionState::InitError.is_loading()).is_false();
    }

    #[test]
    fn failed_refresh_forbids_retry() {
        assert_that(RefreshOutcome::Refreshed.allows_retry()).is_true();
        assert_that(RefreshOutcome::StillValid.allows_retry()).is_true();
        assert_that(RefreshOutcome::Failed.allows_retry()).is_false();
    }
}
