use leptos::prelude::*;
#[cfg(not(feature = "ssr"))]
use leptos_use::{UseIntervalReturn, use_interval};

use crate::{
    app::{Panel, PublishedState, SessionApp},
    error::SessionError,
    identity::IdentityClient,
    state::SessionState,
    transport::HttpTransport,
};

/// Reactive view of the published session state.
///
/// Provided as context by [`use_session`]. Use
/// ```no_run
/// use leptos::prelude::expect_context;
/// use leptos_keycloak_session::SessionSignals;
///
/// let session = expect_context::<SessionSignals>();
/// ```
/// or [`use_session_signals`] in any component rendered below the component that called
/// `use_session`.
#[derive(Debug, Clone, Copy)]
pub struct SessionSignals {
    pub published: Signal<PublishedState>,
    pub state: Signal<SessionState>,

    /// Derived signal stating `true` when `state` is `SessionState::Authenticated`.
    pub is_authenticated: Signal<bool>,

    pub last_error: Signal<Option<SessionError>>,
    pub public_data: Signal<Panel>,
    pub protected_data: Signal<Panel>,
}

/// Connects a [`SessionApp`] to the reactive system.
///
/// - Mirrors the published state into signals and provides them as [`SessionSignals`] context.
/// - Starts session initialization.
/// - Periodically checks the token age and refreshes the token before it expires.
///
/// With the `ssr` feature only the first point applies. The session is initialized and kept
/// fresh by the client after hydration.
///
/// Commands (login, logout, fetching data) are triggered on the `app` itself, e.g.
/// `leptos::task::spawn_local(async move { app.fetch_protected().await; })`.
pub fn use_session<I, T>(app: SessionApp<I, T>) -> SessionSignals
where
    I: IdentityClient,
    T: HttpTransport,
{
    let signals = mirror_published_state(&app);

    #[cfg(not(feature = "ssr"))]
    {
        tracing::trace!("Initializing session...");
        {
            let app = app.clone();
            leptos::task::spawn_local(async move {
                if let Err(err) = app.initialize().await {
                    tracing::error!(?err, "Session could not be initialized.");
                }
            });
        }

        let UseIntervalReturn { counter, .. } = use_interval::<u64>(
            app.controller()
                .options()
                .advanced
                .token_age_check_interval
                .as_millis()
                .try_into()
                .unwrap_or(u64::MAX),
        );
        Effect::new(move |_| {
            let _count = counter.get();
            let app = app.clone();
            leptos::task::spawn_local(async move {
                if let Some(outcome) = app.refresh_if_expiring().await {
                    tracing::trace!(?outcome, "Token was about to expire.");
                }
            });
        });
    }

    provide_context(signals);

    signals
}

/// Signals following every state published by `app`.
fn mirror_published_state<I, T>(app: &SessionApp<I, T>) -> SessionSignals
where
    I: IdentityClient,
    T: HttpTransport,
{
    let published = RwSignal::new(app.published());
    app.subscribe(move |state: &PublishedState| published.set(state.clone()));

    SessionSignals {
        published: published.into(),
        state: Signal::derive(move || published.with(|it| it.state)),
        is_authenticated: Signal::derive(move || published.with(|it| it.state.is_authenticated())),
        last_error: Signal::derive(move || published.with(|it| it.last_error.clone())),
        public_data: Signal::derive(move || published.with(|it| it.public_data.clone())),
        protected_data: Signal::derive(move || published.with(|it| it.protected_data.clone())),
    }
}

/// The [`SessionSignals`] provided by an ancestor's [`use_session`] call.
///
/// # Panics
/// Panics if `use_session` was not called in an ancestor component.
pub fn use_session_signals() -> SessionSignals {
    expect_context::<SessionSignals>()
}
