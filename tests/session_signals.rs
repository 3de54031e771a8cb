//! Runs with `cargo test --features ssr`.

use std::rc::Rc;

use assertr::prelude::*;
use leptos::prelude::*;
use leptos_keycloak_session::{
    Panel, SessionApp, SessionSignals, SessionState, use_session, use_session_signals,
};

mod common;

use common::{MockIdentityClient, MockTransport, transport::message};

#[tokio::test]
async fn use_session_mirrors_published_state_on_the_server() {
    common::tracing::init_subscriber();

    let client = Rc::new(MockIdentityClient::authenticated(300));
    let transport = MockTransport::with_responses([message("Hello from the protected API")]);
    let app = SessionApp::new(common::controller(&client), transport, common::endpoints());

    let owner = Owner::new();
    let (signals, provided): (SessionSignals, SessionSignals) = owner.with(|| {
        let signals = use_session(app.clone());
        (signals, use_session_signals())
    });

    // Initialization is left to the client.
    assert_that(client.init_calls.get()).is_equal_to(0);
    assert_that(signals.state.get_untracked()).is_equal_to(SessionState::Uninitialized);
    assert_that(provided.published.get_untracked()).is_equal_to(app.published());

    app.initialize().await.unwrap();
    app.fetch_protected().await;

    assert_that(signals.published.get_untracked()).is_equal_to(app.published());
    assert_that(signals.is_authenticated.get_untracked()).is_true();
    assert_that(provided.protected_data.get_untracked())
        .is_equal_to(Panel::Loaded("Hello from the protected API".to_owned()));
}
