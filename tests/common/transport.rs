use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use http::StatusCode;
use leptos_keycloak_session::{HttpTransport, TransportError, url::Url};

/// One recorded call: the requested url and the bearer token sent along, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub url: Url,
    pub bearer_token: Option<String>,
}

#[derive(Default)]
struct State {
    responses: VecDeque<Result<serde_json::Value, TransportError>>,
    calls: Vec<RecordedCall>,
}

/// Scripted resource server. Clones share their script and call log.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Rc<RefCell<State>>,
}

pub fn message(text: &str) -> Result<serde_json::Value, TransportError> {
    Ok(serde_json::json!({ "message": text }))
}

pub fn status(status: StatusCode) -> Result<serde_json::Value, TransportError> {
    Err(TransportError::Status { status })
}

pub fn unauthorized() -> Result<serde_json::Value, TransportError> {
    status(StatusCode::UNAUTHORIZED)
}

impl MockTransport {
    pub fn with_responses(
        responses: impl IntoIterator<Item = Result<serde_json::Value, TransportError>>,
    ) -> Self {
        let transport = Self::default();
        transport.state.borrow_mut().responses.extend(responses);
        transport
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.borrow().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.borrow().calls.len()
    }
}

impl HttpTransport for MockTransport {
    async fn get(
        &self,
        url: &Url,
        bearer_token: Option<&str>,
    ) -> Result<serde_json::Value, TransportError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(RecordedCall {
            url: url.clone(),
            bearer_token: bearer_token.map(str::to_owned),
        });
        state.responses.pop_front().unwrap_or_else(|| {
            Err(TransportError::Network {
                reason: "no scripted response left".to_owned(),
            })
        })
    }
}
