use std::{
    cell::RefCell,
    fmt::{Debug, Formatter},
    rc::Rc,
};

use crate::{
    config::ApiEndpoints,
    controller::SessionController,
    error::SessionError,
    executor::{AuthorizedRequestExecutor, RequestError},
    identity::IdentityClient,
    response::ApiMessage,
    state::{RefreshOutcome, SessionState},
    transport::HttpTransport,
};

pub const PUBLIC_RESOURCE: &str = "public";
pub const PROTECTED_RESOURCE: &str = "protected";

/// Result of the last fetch of one resource, as displayed by the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Panel {
    #[default]
    NotRequested,
    Loaded(String),
    Failed(RequestError),
}

impl Panel {
    /// Text to show for this panel. `label` names the resource, e.g. "protected".
    pub fn display_text(&self, label: &str) -> String {
        match self {
            Panel::NotRequested => String::new(),
            Panel::Loaded(message) => message.clone(),
            Panel::Failed(RequestError::NotAuthenticated) => {
                "Not authenticated or token is missing".to_owned()
            }
            Panel::Failed(_) => format!("Failed to fetch {label} data"),
        }
    }
}

/// Everything the UI renders from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishedState {
    pub state: SessionState,
    pub last_error: Option<SessionError>,
    pub public_data: Panel,
    pub protected_data: Panel,
}

#[derive(Debug, Clone, Default)]
struct Panels {
    public_data: Panel,
    protected_data: Panel,
}

type Listener = Rc<dyn Fn(&PublishedState)>;

/// Publishes session state and fetched data, and offers the commands the UI can trigger.
///
/// Cheap to clone. All clones share the same session and panels.
pub struct SessionApp<I: IdentityClient, T: HttpTransport> {
    controller: SessionController<I>,
    executor: AuthorizedRequestExecutor<I, T>,
    transport: Rc<T>,
    panels: Rc<RefCell<Panels>>,
    listeners: Rc<RefCell<Vec<Listener>>>,
}

impl<I: IdentityClient, T: HttpTransport> Clone for SessionApp<I, T> {
    fn clone(&self) -> Self {
        Self {
            controller: self.controller.clone(),
            executor: self.executor.clone(),
            transport: Rc::clone(&self.transport),
            panels: Rc::clone(&self.panels),
            listeners: Rc::clone(&self.listeners),
        }
    }
}

impl<I: IdentityClient, T: HttpTransport> Debug for SessionApp<I, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionApp")
            .field("published", &self.published())
            .finish_non_exhaustive()
    }
}

impl<I: IdentityClient, T: HttpTransport> SessionApp<I, T> {
    pub fn new(controller: SessionController<I>, transport: T, endpoints: ApiEndpoints) -> Self {
        let transport = Rc::new(transport);
        let executor =
            AuthorizedRequestExecutor::new(controller.clone(), Rc::clone(&transport), endpoints);
        let panels = Rc::new(RefCell::new(Panels::default()));
        let listeners: Rc<RefCell<Vec<Listener>>> = Rc::new(RefCell::new(Vec::new()));

        {
            let panels = Rc::clone(&panels);
            let listeners = Rc::clone(&listeners);
            controller.subscribe(move |snapshot| {
                let panels = panels.borrow().clone();
                publish(
                    &listeners,
                    &PublishedState {
                        state: snapshot.state,
                        last_error: snapshot.last_error.clone(),
                        public_data: panels.public_data,
                        protected_data: panels.protected_data,
                    },
                );
            });
        }

        Self {
            controller,
            executor,
            transport,
            panels,
            listeners,
        }
    }

    pub fn controller(&self) -> &SessionController<I> {
        &self.controller
    }

    pub fn executor(&self) -> &AuthorizedRequestExecutor<I, T> {
        &self.executor
    }

    pub fn published(&self) -> PublishedState {
        let snapshot = self.controller.snapshot();
        let panels = self.panels.borrow().clone();
        PublishedState {
            state: snapshot.state,
            last_error: snapshot.last_error,
            public_data: panels.public_data,
            protected_data: panels.protected_data,
        }
    }

    /// Register a listener called with the full published state whenever any part of it changes.
    pub fn subscribe(&self, listener: impl Fn(&PublishedState) + 'static) {
        self.listeners.borrow_mut().push(Rc::new(listener));
    }

    /// See [`SessionController::initialize`].
    pub async fn initialize(&self) -> Result<SessionState, SessionError> {
        self.controller.initialize().await
    }

    /// See [`SessionController::login`].
    pub async fn login(&self) -> Result<(), SessionError> {
        self.controller.login().await
    }

    /// See [`SessionController::logout`].
    pub async fn logout(&self) {
        self.controller.logout().await;
    }

    /// See [`SessionController::refresh_if_expiring`].
    pub async fn refresh_if_expiring(&self) -> Option<RefreshOutcome> {
        self.controller.refresh_if_expiring().await
    }

    /// Fetches the public resource. No token is sent and the session state is not consulted.
    pub async fn fetch_public(&self) -> Panel {
        let result = match self.executor.endpoints().resolve(PUBLIC_RESOURCE) {
            Ok(url) => self
                .transport
                .get(&url, None)
                .await
                .map_err(|source| RequestError::RequestFailed { source }),
            Err(source) => Err(RequestError::InvalidResource {
                resource_id: PUBLIC_RESOURCE.to_owned(),
                source,
            }),
        };
        let panel = to_panel(PUBLIC_RESOURCE, result);
        self.panels.borrow_mut().public_data = panel.clone();
        publish(&self.listeners, &self.published());
        panel
    }

    /// Fetches the protected resource through the [`AuthorizedRequestExecutor`].
    pub async fn fetch_protected(&self) -> Panel {
        let result = self.executor.execute(PROTECTED_RESOURCE).await;
        let panel = to_panel(PROTECTED_RESOURCE, result);
        self.panels.borrow_mut().protected_data = panel.clone();
        publish(&self.listeners, &self.published());
        panel
    }
}

fn to_panel(label: &str, result: Result<serde_json::Value, RequestError>) -> Panel {
    let result = result.and_then(|payload| {
        ApiMessage::from_payload(payload).map_err(|err| RequestError::InvalidPayload {
            reason: err.to_string(),
        })
    });
    match result {
        Ok(ApiMessage { message }) => Panel::Loaded(message),
        Err(err) => {
            tracing::error!(?err, "Error fetching {label} data");
            Panel::Failed(err)
        }
    }
}

fn publish(listeners: &RefCell<Vec<Listener>>, published: &PublishedState) {
    let listeners = listeners.borrow().clone();
    for listener in listeners {
        listener(published);
    }
}
