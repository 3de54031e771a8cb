#![allow(dead_code)]

use leptos_keycloak_session::{ApiEndpoints, SessionController, SessionOptions, url::Url};
use std::rc::Rc;

pub mod identity;
pub mod tracing;
pub mod transport;

pub use identity::{MockIdentityClient, RefreshStep};
pub use transport::MockTransport;

pub fn origin() -> Url {
    Url::parse("http://localhost:5173").unwrap()
}

pub fn options() -> SessionOptions {
    SessionOptions::for_origin(&origin())
}

pub fn endpoints() -> ApiEndpoints {
    ApiEndpoints::default()
}

/// A controller driving `client`. The test keeps its own handle to the client.
pub fn controller(client: &Rc<MockIdentityClient>) -> SessionController<MockIdentityClient> {
    SessionController::from_shared(Rc::clone(client), options())
}

/// A controller which already went through a successful initialization.
pub async fn authenticated_controller(
    expires_in_seconds: i64,
) -> (Rc<MockIdentityClient>, SessionController<MockIdentityClient>) {
    let client = Rc::new(MockIdentityClient::authenticated(expires_in_seconds));
    let controller = controller(&client);
    controller.initialize().await.unwrap();
    (client, controller)
}
