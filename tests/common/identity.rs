use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
};

use futures::channel::oneshot;
use jsonwebtoken::{EncodingKey, Header};
use leptos_keycloak_session::{
    ExpiryHandler, IdentityClient, IdentityError, InitOptions, LogoutOptions,
};
use time::OffsetDateTime;

/// What the next `update_token` call does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStep {
    /// Issue a new token expiring in `expires_in` seconds.
    Renewed { expires_in: i64 },
    StillValid,
    Rejected,
}

/// Scripted stand-in for a keycloak-js instance.
#[derive(Default)]
pub struct MockIdentityClient {
    init_result: RefCell<Option<Result<bool, IdentityError>>>,
    logout_result: RefCell<Option<IdentityError>>,
    token: RefCell<Option<String>>,
    time_skew: Cell<Option<i64>>,
    issued: Cell<u32>,
    refresh_steps: RefCell<VecDeque<RefreshStep>>,
    init_gate: RefCell<Option<oneshot::Receiver<()>>>,
    refresh_gate: RefCell<Option<oneshot::Receiver<()>>>,
    expiry_handler: RefCell<Option<ExpiryHandler>>,

    pub init_calls: Cell<usize>,
    pub login_calls: Cell<usize>,
    pub logout_calls: Cell<usize>,
    pub update_token_calls: Cell<usize>,
    pub last_min_validity: Cell<Option<u32>>,
}

pub fn now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

impl MockIdentityClient {
    /// `init` resolves `true` and a token expiring in `expires_in` seconds is available.
    pub fn authenticated(expires_in: i64) -> Self {
        let client = Self::default();
        client.init_result.replace(Some(Ok(true)));
        client.issue_token(expires_in);
        client
    }

    /// `init` resolves `false`.
    pub fn unauthenticated() -> Self {
        let client = Self::default();
        client.init_result.replace(Some(Ok(false)));
        client
    }

    /// `init` rejects.
    pub fn failing_init() -> Self {
        let client = Self::default();
        client.init_result.replace(Some(Err(IdentityError::Rejected {
            operation: "init",
            reason: "network error".to_owned(),
        })));
        client
    }

    /// `init` resolves `true` but no token is exposed afterwards.
    pub fn authenticated_without_token() -> Self {
        let client = Self::default();
        client.init_result.replace(Some(Ok(true)));
        client
    }

    pub fn with_time_skew(self, skew: i64) -> Self {
        self.time_skew.set(Some(skew));
        self
    }

    pub fn with_refresh_steps(self, steps: impl IntoIterator<Item = RefreshStep>) -> Self {
        self.refresh_steps.borrow_mut().extend(steps);
        self
    }

    pub fn push_refresh_step(&self, step: RefreshStep) {
        self.refresh_steps.borrow_mut().push_back(step);
    }

    pub fn reject_logout(&self) {
        self.logout_result.replace(Some(IdentityError::Rejected {
            operation: "logout",
            reason: "network error".to_owned(),
        }));
    }

    /// `init` will not complete before the returned sender is used (or dropped).
    pub fn hold_init(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.init_gate.replace(Some(rx));
        tx
    }

    /// The next `update_token` call will not complete before the returned sender is used
    /// (or dropped).
    pub fn hold_next_refresh(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.refresh_gate.replace(Some(rx));
        tx
    }

    pub fn current_token(&self) -> Option<String> {
        self.token.borrow().clone()
    }

    pub fn has_expiry_handler(&self) -> bool {
        self.expiry_handler.borrow().is_some()
    }

    /// Simulates the provider noticing that the token expired.
    /// Returns `false` if no handler is registered.
    pub async fn fire_token_expired(&self) -> bool {
        let handler = self.expiry_handler.borrow().clone();
        match handler {
            Some(handler) => {
                handler().await;
                true
            }
            None => false,
        }
    }

    fn issue_token(&self, expires_in: i64) -> String {
        let serial = self.issued.get() + 1;
        self.issued.set(serial);
        let now = now();
        let claims = serde_json::json!({
            "exp": now + expires_in,
            "iat": now,
            "sub": "a7060488-c80b-40c5-83e2-d7000bf9738e",
            "preferred_username": "bob",
            "jti": format!("token-{serial}"),
        });
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"realm-secret"),
        )
        .unwrap();
        self.token.replace(Some(token.clone()));
        token
    }
}

impl IdentityClient for MockIdentityClient {
    async fn init(&self, _options: &InitOptions) -> Result<bool, IdentityError> {
        self.init_calls.set(self.init_calls.get() + 1);
        let gate = self.init_gate.borrow_mut().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.init_result.borrow().clone().unwrap_or(Ok(false))
    }

    async fn login(&self) -> Result<(), IdentityError> {
        self.login_calls.set(self.login_calls.get() + 1);
        Ok(())
    }

    async fn logout(&self, _options: &LogoutOptions) -> Result<(), IdentityError> {
        self.logout_calls.set(self.logout_calls.get() + 1);
        self.token.replace(None);
        match self.logout_result.borrow().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn update_token(&self, min_validity_seconds: u32) -> Result<bool, IdentityError> {
        self.update_token_calls
            .set(self.update_token_calls.get() + 1);
        self.last_min_validity.set(Some(min_validity_seconds));

        let gate = self.refresh_gate.borrow_mut().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        let step = self
            .refresh_steps
            .borrow_mut()
            .pop_front()
            .unwrap_or(RefreshStep::StillValid);
        match step {
            RefreshStep::Renewed { expires_in } => {
                self.issue_token(expires_in);
                Ok(true)
            }
            RefreshStep::StillValid => Ok(false),
            RefreshStep::Rejected => {
                self.token.replace(None);
                Err(IdentityError::Rejected {
                    operation: "updateToken",
                    reason: "invalid_grant".to_owned(),
                })
            }
        }
    }

    fn token(&self) -> Option<String> {
        self.token.borrow().clone()
    }

    fn time_skew(&self) -> Option<i64> {
        self.time_skew.get()
    }

    fn set_on_token_expired(&self, handler: Option<ExpiryHandler>) {
        self.expiry_handler.replace(handler);
    }
}
