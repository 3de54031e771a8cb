use std::time::Duration;
use url::Url;

/// Everything a `SessionController` needs to know to talk to the identity provider.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    /// Handed to `IdentityClient::init` once, when the session initializes.
    pub init: InitOptions,

    /// Handed to `IdentityClient::logout`.
    pub logout: LogoutOptions,

    pub advanced: AdvancedOptions,
}

impl SessionOptions {
    /// Options for an application served from `origin`: silent SSO check on load, PKCE and
    /// redirecting back to `origin` after logout.
    pub fn for_origin(origin: &Url) -> Self {
        Self {
            init: InitOptions::check_sso(origin),
            logout: LogoutOptions {
                redirect_uri: Some(origin.clone()),
            },
            advanced: AdvancedOptions::default(),
        }
    }
}

/// What the identity provider should do when initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnLoad {
    /// Only check whether an SSO session exists. Never forces a login.
    CheckSso,

    /// Redirect to the login page if no SSO session exists.
    LoginRequired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkceMethod {
    S256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Standard,
    Implicit,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    Query,
    Fragment,
}

/// Where the identity provider keeps its tokens between redirects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStorage {
    /// Scoped to the current tab. Gone once the tab closes.
    Session,
    Local,
    None,
}

/// Initialization options of the identity provider client.
///
/// This crate passes them through untouched. Interpreting them is the job of the
/// `IdentityClient` implementation.
#[derive(Debug, Clone, PartialEq)]
pub struct InitOptions {
    pub on_load: OnLoad,

    /// Page loaded in a hidden iframe to perform the silent SSO check.
    pub silent_check_sso_redirect_uri: Option<Url>,

    pub pkce_method: Option<PkceMethod>,

    /// Whether the provider should poll its login status through an iframe.
    pub check_login_iframe: bool,

    pub enable_logging: bool,

    pub flow: Flow,

    pub response_mode: ResponseMode,

    pub token_storage: TokenStorage,
}

impl InitOptions {
    /// Silent SSO check with PKCE (S256), standard flow and query response mode.
    /// Tokens are kept in session storage and no login iframe is used.
    ///
    /// The silent check page is expected at `<origin>/silent-check-sso.html`.
    pub fn check_sso(origin: &Url) -> Self {
        Self {
            on_load: OnLoad::CheckSso,
            silent_check_sso_redirect_uri: origin.join("silent-check-sso.html").ok(),
            pkce_method: Some(PkceMethod::S256),
            check_login_iframe: false,
            enable_logging: true,
            flow: Flow::Standard,
            response_mode: ResponseMode::Query,
            token_storage: TokenStorage::Session,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutOptions {
    /// Url to which you want to be redirected after a successful logout.
    pub redirect_uri: Option<Url>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvancedOptions {
    /// How much validity (in seconds) an access token must have left to not be refreshed.
    /// Used when reacting to expiry notifications, when recovering from a 401 response and
    /// by the periodic age check.
    /// Defaults to `30`.
    pub min_validity_seconds: u32,

    /// Interval after which the access token should be checked for its age.
    /// Defaults to `Duration::from_secs(5)`.
    pub token_age_check_interval: Duration,
}

impl Default for AdvancedOptions {
    fn default() -> Self {
        Self {
            min_validity_seconds: 30,
            token_age_check_interval: Duration::from_secs(5),
        }
    }
}

/// Location of the resource server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoints {
    /// E.g. "http://localhost:3000/"
    pub base_url: Url,
}

impl ApiEndpoints {
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }

    /// Url of the resource with the given id, e.g. `protected` resolves to
    /// `<base_url>/api/protected`.
    pub fn resolve(&self, resource_id: &str) -> Result<Url, url::ParseError> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join("api/")?.join(resource_id)
    }
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            base_url: Url::parse("http://localhost:3000/").expect("valid default url"),
        }
    }
}
