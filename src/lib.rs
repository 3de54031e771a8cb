//! Session and token lifecycle management for Leptos applications authenticating against
//! Keycloak (or any OIDC provider with a keycloak-js like client).
//!
//! - [`SessionController`] establishes whether a session exists on load, reacts to token expiry
//!   notifications and coalesces concurrent refreshes into a single provider call.
//! - [`AuthorizedRequestExecutor`] attaches the current access token to requests and recovers
//!   from a 401 response by refreshing the token and retrying exactly once.
//! - [`SessionApp`] publishes `{ state, last_error, public_data, protected_data }` and offers the
//!   commands the UI triggers. [`use_session`] mirrors it into Leptos signals.
//!
//! The identity provider client and the HTTP transport are consumed through the
//! [`IdentityClient`] and [`HttpTransport`] traits. [`ReqwestTransport`] implements the latter.
//!
//! ```ignore
//! use leptos::prelude::*;
//! use leptos_keycloak_session::{
//!     url::Url, use_session, ApiEndpoints, ReqwestTransport, SessionApp, SessionController,
//!     SessionOptions,
//! };
//!
//! #[component]
//! pub fn App() -> impl IntoView {
//!     let origin = Url::parse("http://localhost:5173").unwrap();
//!     let controller = SessionController::new(
//!         MyKeycloakJsClient::new("http://localhost:8080", "myrealm", "myclient"),
//!         SessionOptions::for_origin(&origin),
//!     );
//!     let app = SessionApp::new(controller, ReqwestTransport::default(), ApiEndpoints::default());
//!     let session = use_session(app.clone());
//!
//!     view! {
//!         <Show when=move || session.is_authenticated.get() fallback=|| "User is not authenticated">
//!             <p>"User is authenticated"</p>
//!         </Show>
//!     }
//! }
//! ```

mod app;
mod config;
mod controller;
mod error;
mod executor;
mod hooks;
mod identity;
mod response;
mod state;
mod time_ext;
mod token_store;
mod transport;

// Library exports.
pub use app::*;
pub use config::*;
pub use controller::SessionController;
pub use error::{IdentityError, SessionError};
pub use executor::{AuthorizedRequestExecutor, ProtectedRequest, RequestError};
pub use hooks::*;
pub use identity::{ExpiryHandler, IdentityClient, ParsedToken};
pub use response::ApiMessage;
pub use state::*;
pub use token_store::{Credential, TokenStore};
pub use transport::{HttpTransport, ReqwestTransport, TransportError};
pub mod url {
    pub use url::Url;
}
pub mod reqwest {
    pub use reqwest::*;
}

type AccessToken = String;
