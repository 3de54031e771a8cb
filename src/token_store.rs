use std::time::Duration as StdDuration;

use time::OffsetDateTime;

use crate::{AccessToken, time_ext::TimeDurationExt};

/// A bearer token together with the expiry metadata needed to judge its remaining validity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Access token. Allows access to resources requiring authentication unless expired.
    pub token: AccessToken,

    /// Point in time (seconds since the unix epoch) when `token` expires, as claimed by the
    /// identity provider.
    pub expiry_epoch_seconds: i64,

    /// Correction between our clock and the identity provider's clock.
    pub clock_skew_seconds: i64,
}

impl Credential {
    fn effective_expiry(&self) -> i64 {
        self.expiry_epoch_seconds
            .saturating_sub(self.clock_skew_seconds)
    }
}

/// Holds the current credential. Only the `SessionController` writes to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenStore {
    credential: Option<Credential>,
}

impl TokenStore {
    /// Replace the current credential. Readers either see the old or the new credential,
    /// never a mix of both.
    pub(crate) fn set(
        &mut self,
        token: AccessToken,
        expiry_epoch_seconds: i64,
        clock_skew_seconds: i64,
    ) {
        self.credential = Some(Credential {
            token,
            expiry_epoch_seconds,
            clock_skew_seconds,
        });
    }

    pub(crate) fn clear(&mut self) {
        self.credential = None;
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn current_token(&self) -> Option<&str> {
        self.credential.as_ref().map(|it| it.token.as_str())
    }

    pub fn expiry_epoch_seconds(&self) -> Option<i64> {
        self.credential.as_ref().map(|it| it.expiry_epoch_seconds)
    }

    /// Whether the token expires within the next `margin_seconds` (or already did).
    /// Reports `true` when no credential is held.
    pub fn is_expiring_within(&self, margin_seconds: u32) -> bool {
        self.is_expiring_within_at(margin_seconds, OffsetDateTime::now_utc())
    }

    pub fn is_expiring_within_at(&self, margin_seconds: u32, now: OffsetDateTime) -> bool {
        match &self.credential {
            Some(credential) => {
                now.unix_timestamp().saturating_add(i64::from(margin_seconds))
                    >= credential.effective_expiry()
            }
            None => true,
        }
    }

    /// Seconds of validity left, corrected by the clock skew. Negative once expired.
    pub fn seconds_until_expiry(&self) -> Option<i64> {
        self.seconds_until_expiry_at(OffsetDateTime::now_utc())
    }

    pub fn seconds_until_expiry_at(&self, now: OffsetDateTime) -> Option<i64> {
        self.credential
            .as_ref()
            .map(|it| it.effective_expiry().saturating_sub(now.unix_timestamp()))
    }

    /// The duration for which the token is still valid. `Duration::ZERO` if expired or absent.
    pub fn time_left(&self) -> StdDuration {
        self.seconds_until_expiry()
            .map_or(StdDuration::ZERO, |secs| {
                time::Duration::seconds(secs).to_std_duration()
            })
    }
}
