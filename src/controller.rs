use std::{
    cell::RefCell,
    fmt::{Debug, Formatter},
    rc::{Rc, Weak},
};

use futures::{
    FutureExt,
    future::{LocalBoxFuture, Shared},
};

use crate::{
    config::SessionOptions,
    error::{IdentityError, SessionError},
    identity::{ExpiryHandler, IdentityClient},
    state::{RefreshOutcome, SessionSnapshot, SessionState, SessionVersion},
    token_store::TokenStore,
};

type SharedRefresh = Shared<LocalBoxFuture<'static, RefreshOutcome>>;

type SharedInit = Shared<LocalBoxFuture<'static, Result<SessionState, SessionError>>>;

type Listener = Rc<dyn Fn(&SessionSnapshot)>;

/// The session entity. Only ever mutated by the `SessionController` owning it.
#[derive(Debug, Default)]
struct Session {
    state: SessionState,
    store: TokenStore,
    last_error: Option<SessionError>,

    /// Which authentication session we are currently in.
    ///
    /// Incremented on every authentication boundary (init outcome, renewed token, demotion,
    /// logout) so that a refresh started in an older session can detect that its result is stale.
    version: SessionVersion,
}

impl Session {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            version: self.version,
            has_token: self.store.current_token().is_some(),
            expiry_epoch_seconds: self.store.expiry_epoch_seconds(),
            last_error: self.last_error.clone(),
        }
    }

    fn authenticate(&mut self, token: String, expiry_epoch_seconds: i64, skew: i64) {
        self.store.set(token, expiry_epoch_seconds, skew);
        self.state = SessionState::Authenticated;
        self.last_error = None;
        self.version = self.version.increment();
    }

    fn demote(&mut self, last_error: Option<SessionError>) {
        self.store.clear();
        self.state = SessionState::Unauthenticated;
        if last_error.is_some() {
            self.last_error = last_error;
        }
        self.version = self.version.increment();
    }
}

struct Inner<I> {
    client: Rc<I>,
    options: SessionOptions,
    session: RefCell<Session>,
    init_in_flight: RefCell<Option<SharedInit>>,
    refresh_in_flight: RefCell<Option<SharedRefresh>>,
    listeners: RefCell<Vec<Listener>>,
}

/// Drives the session through its lifecycle and is the only writer of session state and
/// token store.
///
/// Cheap to clone. All clones operate on the same session.
///
/// At most one token refresh is in flight at any time. Callers requesting a refresh while one is
/// pending await the pending refresh and observe its outcome.
pub struct SessionController<I: IdentityClient> {
    inner: Rc<Inner<I>>,
}

impl<I: IdentityClient> Clone for SessionController<I> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<I: IdentityClient> Debug for SessionController<I> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("session", &self.inner.session.borrow())
            .field(
                "refresh_in_flight",
                &self.inner.refresh_in_flight.borrow().is_some(),
            )
            .finish_non_exhaustive()
    }
}

impl<I: IdentityClient> SessionController<I> {
    pub fn new(client: I, options: SessionOptions) -> Self {
        Self::from_shared(Rc::new(client), options)
    }

    /// Use this if you need to keep a handle to the client yourself.
    pub fn from_shared(client: Rc<I>, options: SessionOptions) -> Self {
        Self {
            inner: Rc::new(Inner {
                client,
                options,
                session: RefCell::new(Session::default()),
                init_in_flight: RefCell::new(None),
                refresh_in_flight: RefCell::new(None),
                listeners: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.inner.options
    }

    pub fn state(&self) -> SessionState {
        self.inner.session.borrow().state
    }

    pub fn last_error(&self) -> Option<SessionError> {
        self.inner.session.borrow().last_error.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.session.borrow().snapshot()
    }

    /// A copy of the current token store.
    pub fn token_store(&self) -> TokenStore {
        self.inner.session.borrow().store.clone()
    }

    /// The current token. Only ever `Some` while the session is authenticated.
    pub fn current_token(&self) -> Option<String> {
        let session = self.inner.session.borrow();
        match session.state {
            SessionState::Authenticated => session.store.current_token().map(str::to_owned),
            _ => None,
        }
    }

    pub fn is_refresh_in_flight(&self) -> bool {
        self.inner.refresh_in_flight.borrow().is_some()
    }

    /// Register a listener called with a fresh snapshot after every state transition.
    pub fn subscribe(&self, listener: impl Fn(&SessionSnapshot) + 'static) {
        self.inner.listeners.borrow_mut().push(Rc::new(listener));
    }

    /// Checks for an existing session with the identity provider.
    ///
    /// Only the first call contacts the provider. Calls made while it is pending await its
    /// outcome. Later calls report the outcome of the first one.
    ///
    /// # Errors
    /// Returns `SessionError::InitializationFailed` if the provider could not be initialized.
    /// The session stays in `SessionState::InitError` until the page is reloaded.
    pub async fn initialize(&self) -> Result<SessionState, SessionError> {
        let pending = {
            let mut in_flight = self.inner.init_in_flight.borrow_mut();
            match in_flight.clone() {
                Some(pending) => {
                    tracing::trace!("Joining pending session initialization.");
                    pending
                }
                None => {
                    let mut session = self.inner.session.borrow_mut();
                    match session.state {
                        SessionState::Uninitialized => session.state = SessionState::Initializing,
                        SessionState::InitError => {
                            tracing::debug!("Session initialization already failed.");
                            return Err(session.last_error.clone().unwrap_or(
                                SessionError::InitializationFailed {
                                    source: IdentityError::MissingToken,
                                },
                            ));
                        }
                        state => {
                            tracing::debug!(?state, "Session was already initialized.");
                            return Ok(state);
                        }
                    }
                    drop(session);

                    let init = self.start_initialization();
                    *in_flight = Some(init.clone());
                    drop(in_flight);
                    self.notify();
                    init
                }
            }
        };
        pending.await
    }

    fn start_initialization(&self) -> SharedInit {
        let client = Rc::clone(&self.inner.client);
        let options = self.inner.options.init.clone();
        let weak = Rc::downgrade(&self.inner);

        async move {
            tracing::trace!("Initializing identity provider...");
            let result = client.init(&options).await;
            match weak.upgrade() {
                Some(inner) => SessionController { inner }.finish_initialization(result),
                None => Err(SessionError::NotReady {
                    state: SessionState::Initializing,
                }),
            }
        }
        .boxed_local()
        .shared()
    }

    fn finish_initialization(
        &self,
        result: Result<bool, IdentityError>,
    ) -> Result<SessionState, SessionError> {
        self.inner.init_in_flight.borrow_mut().take();

        let result = match result {
            Ok(true) => match self.read_credential() {
                Ok((token, expiry, skew)) => {
                    self.inner
                        .session
                        .borrow_mut()
                        .authenticate(token, expiry, skew);
                    self.register_expiry_handler();
                    tracing::info!("User is authenticated");
                    Ok(SessionState::Authenticated)
                }
                Err(source) => Err(SessionError::InitializationFailed { source }),
            },
            Ok(false) => {
                let mut session = self.inner.session.borrow_mut();
                session.state = SessionState::Unauthenticated;
                session.version = session.version.increment();
                tracing::info!("User is not authenticated");
                Ok(SessionState::Unauthenticated)
            }
            Err(source) => Err(SessionError::InitializationFailed { source }),
        };

        if let Err(err) = &result {
            tracing::error!(?err, "Identity provider init error");
            let mut session = self.inner.session.borrow_mut();
            session.store.clear();
            session.state = SessionState::InitError;
            session.last_error = Some(err.clone());
            session.version = session.version.increment();
        }

        self.notify();
        result
    }

    /// Redirects to the identity provider's login page.
    ///
    /// # Errors
    /// - `SessionError::AlreadyAuthenticated` if the user is already logged in.
    /// - `SessionError::NotReady` if initialization did not finish yet.
    /// - `SessionError::LoginFailed` if the provider could not start the login.
    pub async fn login(&self) -> Result<(), SessionError> {
        match self.state() {
            SessionState::Unauthenticated | SessionState::InitError => self
                .inner
                .client
                .login()
                .await
                .map_err(|source| SessionError::LoginFailed { source }),
            SessionState::Authenticated => Err(SessionError::AlreadyAuthenticated),
            state @ (SessionState::Uninitialized | SessionState::Initializing) => {
                Err(SessionError::NotReady { state })
            }
        }
    }

    /// Logs the user out at the identity provider and forgets all local token data.
    ///
    /// The local transition to `Unauthenticated` happens as soon as the provider call returns,
    /// independent of whether its redirect ever completes. Calling this while already
    /// unauthenticated leaves the session unauthenticated and raises no error.
    pub async fn logout(&self) {
        let state = self.state();
        if !state.is_provider_ready() {
            tracing::debug!(?state, "Ignoring logout, identity provider is not initialized.");
            return;
        }

        if let Err(err) = self.inner.client.logout(&self.inner.options.logout).await {
            tracing::warn!(?err, "Identity provider rejected logout. Dropping local session anyway.");
        }

        self.inner.client.set_on_token_expired(None);
        self.inner.session.borrow_mut().demote(None);
        tracing::trace!("Dropped all token data");
        self.notify();
    }

    /// Invoked once the identity provider considers the current token expired.
    /// Performs a single refresh with the configured minimum validity.
    pub async fn handle_expiry_notification(&self) -> RefreshOutcome {
        tracing::trace!("Token expired. Refreshing...");
        let outcome = self
            .refresh_if_needed(self.inner.options.advanced.min_validity_seconds)
            .await;
        match outcome {
            RefreshOutcome::Refreshed => tracing::info!("Token refreshed successfully"),
            RefreshOutcome::StillValid => match self.token_store().seconds_until_expiry() {
                Some(seconds) => tracing::info!("Token not refreshed, valid for {seconds} seconds"),
                None => tracing::info!("Token not refreshed, still valid"),
            },
            RefreshOutcome::Failed => tracing::error!("Failed to refresh token"),
        }
        outcome
    }

    /// Asks the identity provider to refresh the token if it expires within `margin_seconds`.
    ///
    /// - `Refreshed`: a new token is in the token store, the session stays authenticated.
    /// - `StillValid`: nothing changed, the session stays authenticated.
    /// - `Failed`: the session is unauthenticated and the token store is empty.
    ///
    /// Joins an already pending refresh instead of starting a second one.
    /// Fails immediately, without contacting the provider, while not authenticated.
    pub async fn refresh_if_needed(&self, margin_seconds: u32) -> RefreshOutcome {
        let pending = {
            let mut in_flight = self.inner.refresh_in_flight.borrow_mut();
            match in_flight.clone() {
                Some(pending) => {
                    tracing::trace!("Joining in-flight token refresh.");
                    pending
                }
                None => {
                    if !self.state().is_authenticated() {
                        tracing::debug!(
                            state = ?self.state(),
                            "Requested token refresh has no effect, as the session is not authenticated."
                        );
                        return RefreshOutcome::Failed;
                    }
                    let refresh = self.start_refresh(margin_seconds);
                    *in_flight = Some(refresh.clone());
                    refresh
                }
            }
        };
        pending.await
    }

    /// Refreshes the token if the token store reports it to expire within the configured
    /// minimum validity. Returns `None` if no refresh was necessary.
    pub async fn refresh_if_expiring(&self) -> Option<RefreshOutcome> {
        let margin = self.inner.options.advanced.min_validity_seconds;
        let expiring = {
            let session = self.inner.session.borrow();
            session.state.is_authenticated() && session.store.is_expiring_within(margin)
        };
        match expiring {
            true => Some(self.refresh_if_needed(margin).await),
            false => None,
        }
    }

    /// Forces the session into `Unauthenticated`, e.g. after the resource server rejected a
    /// freshly validated token.
    pub(crate) fn expire(&self, reason: SessionError) {
        if !self.state().is_authenticated() {
            return;
        }
        tracing::warn!(?reason, "Session expired. Dropping all token data.");
        self.inner.client.set_on_token_expired(None);
        self.inner.session.borrow_mut().demote(Some(reason));
        self.notify();
    }

    fn start_refresh(&self, margin_seconds: u32) -> SharedRefresh {
        let client = Rc::clone(&self.inner.client);
        let weak = Rc::downgrade(&self.inner);
        let started_in = self.inner.session.borrow().version;

        async move {
            let result = client.update_token(margin_seconds).await;
            match weak.upgrade() {
                Some(inner) => SessionController { inner }.finish_refresh(result, started_in),
                None => RefreshOutcome::Failed,
            }
        }
        .boxed_local()
        .shared()
    }

    fn finish_refresh(
        &self,
        result: Result<bool, IdentityError>,
        started_in: SessionVersion,
    ) -> RefreshOutcome {
        self.inner.refresh_in_flight.borrow_mut().take();

        let current = self.snapshot();
        if current.version != started_in || !current.state.is_authenticated() {
            tracing::debug!(
                state = ?current.state,
                "Discarding refresh result, the session changed while the refresh was in flight."
            );
            return match current.state {
                SessionState::Authenticated => RefreshOutcome::StillValid,
                _ => RefreshOutcome::Failed,
            };
        }

        let outcome = match result.and_then(|refreshed| match refreshed {
            true => self.read_credential().map(Some),
            false => Ok(None),
        }) {
            Ok(Some((token, expiry, skew))) => {
                self.inner
                    .session
                    .borrow_mut()
                    .authenticate(token, expiry, skew);
                RefreshOutcome::Refreshed
            }
            Ok(None) => RefreshOutcome::StillValid,
            Err(source) => {
                tracing::warn!(?source, "Token refresh failed. Logging user out.");
                self.inner.client.set_on_token_expired(None);
                self.inner
                    .session
                    .borrow_mut()
                    .demote(Some(SessionError::AuthenticationExpired { source }));
                RefreshOutcome::Failed
            }
        };

        if outcome != RefreshOutcome::StillValid {
            self.notify();
        }
        outcome
    }

    /// Token, expiry and clock skew as currently known by the identity provider.
    fn read_credential(&self) -> Result<(String, i64, i64), IdentityError> {
        let client = &self.inner.client;
        let token = client
            .token()
            .filter(|it| !it.is_empty())
            .ok_or(IdentityError::MissingToken)?;
        let parsed = client.token_parsed().ok_or(IdentityError::MissingToken)?;
        Ok((token, parsed.exp, client.time_skew().unwrap_or_default()))
    }

    fn register_expiry_handler(&self) {
        let weak = Rc::downgrade(&self.inner);
        let handler: ExpiryHandler = Rc::new(move || {
            let weak: Weak<Inner<I>> = weak.clone();
            async move {
                if let Some(inner) = weak.upgrade() {
                    SessionController { inner }
                        .handle_expiry_notification()
                        .await;
                }
            }
            .boxed_local()
        });
        self.inner.client.set_on_token_expired(Some(handler));
    }

    fn notify(&self) {
        let snapshot = self.snapshot();
        let listeners = self.inner.listeners.borrow().clone();
        for listener in listeners {
            listener(&snapshot);
        }
    }
}
