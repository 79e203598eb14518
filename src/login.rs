use crate::app::AppState;
use crate::error::AuthError;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Form, Json,
    extract::{FromRequestParts, State},
    http::{StatusCode, request::Parts},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::fs::{self, create_dir_all};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use uuid::Uuid;

/// Name of the cookie carrying the session id
pub const SESSION_COOKIE: &str = "session";

/// Stored account for email/password sign-in
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    /// Email address, also the account key (lower-cased)
    pub email: String,

    /// Name shown on the page
    pub display_name: String,

    /// Argon2 hash of the user's password
    pub password_hash: String,

    pub created_at: DateTime<Utc>,
}

/// Login form data
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Registration form data
#[derive(Debug, Serialize, Deserialize)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// How a session was established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Password,
    Google,
}

/// A verified identity, ready to open a session for
///
/// Only constructed through [`Identity::new`], which rejects identities
/// without a subject or a usable email address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    user_id: String,
    display_name: String,
    email: String,
    avatar_url: Option<String>,
    provider: Provider,
}

impl Identity {
    pub fn new(
        user_id: &str,
        display_name: Option<&str>,
        email: &str,
        avatar_url: Option<&str>,
        provider: Provider,
    ) -> Result<Self, AuthError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(AuthError::InvalidIdentity("missing subject".into()));
        }

        let email = email.trim();
        if !is_email(email) {
            return Err(AuthError::InvalidIdentity(format!(
                "invalid email address {:?}",
                email
            )));
        }

        // Fall back to the mailbox name when the provider has no display name
        let display_name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or(email))
            .to_string();

        let avatar_url = avatar_url
            .map(str::trim)
            .filter(|url| url.starts_with("https://") || url.starts_with("http://"))
            .map(str::to_string);

        Ok(Identity {
            user_id: user_id.to_string(),
            display_name,
            email: email.to_string(),
            avatar_url,
            provider,
        })
    }

    pub fn from_user(user: &User) -> Result<Self, AuthError> {
        Identity::new(
            &user.email,
            Some(&user.display_name),
            &user.email,
            None,
            Provider::Password,
        )
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

fn is_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !value.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// An authenticated user session
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Session {
    #[serde(skip)]
    pub id: String,
    pub user_id: String,
    pub display_name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub provider: Provider,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Live sessions, owned by the application state
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    lifetime: chrono::Duration,
}

impl SessionStore {
    pub fn new(lifetime: chrono::Duration) -> Self {
        SessionStore {
            sessions: RwLock::new(HashMap::new()),
            lifetime,
        }
    }

    /// Open a session for a verified identity
    pub fn create(&self, identity: Identity) -> Session {
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: identity.user_id,
            display_name: identity.display_name,
            email: identity.email,
            avatar_url: identity.avatar_url,
            provider: identity.provider,
            expires_at: Utc::now() + self.lifetime,
        };

        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.insert(session.id.clone(), session.clone());
        log::info!("opened {:?} session for {}", session.provider, session.email);

        session
    }

    /// Look up an unexpired session
    pub fn get(&self, session_id: &str) -> Option<Session> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions
            .get(session_id)
            .filter(|session| !session.is_expired(Utc::now()))
            .cloned()
    }

    pub fn revoke(&self, session_id: &str) -> Option<Session> {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.remove(session_id)
    }

    /// Drop expired sessions, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        before - sessions.len()
    }
}

/// Accounts stored as a JSON map in a single file
pub struct UserStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file
    write_lock: Mutex<()>,
}

impl UserStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        UserStore {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the data directory and an empty users file if missing
    pub fn init(&self) -> std::io::Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                create_dir_all(dir)?;
            }
        }
        if !self.path.exists() {
            fs::write(&self.path, b"{}")?;
        }
        Ok(())
    }

    /// All registered users keyed by lower-cased email
    pub fn load(&self) -> Result<HashMap<String, User>, AuthError> {
        let contents = fs::read_to_string(&self.path)
            .map_err(|e| AuthError::Store(format!("failed to read users file: {}", e)))?;
        serde_json::from_str(&contents)
            .map_err(|e| AuthError::Store(format!("failed to parse users file: {}", e)))
    }

    fn save(&self, users: &HashMap<String, User>) -> Result<(), AuthError> {
        let json = serde_json::to_string_pretty(users)
            .map_err(|e| AuthError::Store(format!("failed to serialize users: {}", e)))?;
        fs::write(&self.path, json)
            .map_err(|e| AuthError::Store(format!("failed to write users file: {}", e)))
    }

    /// Register a new account
    ///
    /// The password is hashed with Argon2 before it is stored.
    pub fn register(&self, name: &str, email: &str, password: &str) -> Result<User, AuthError> {
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() || email.is_empty() || password.is_empty() {
            return Err(AuthError::MissingFields);
        }
        if !is_email(email) {
            return Err(AuthError::InvalidIdentity(format!(
                "invalid email address {:?}",
                email
            )));
        }

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut users = self.load()?;
        let key = email.to_lowercase();
        if users.contains_key(&key) {
            return Err(AuthError::EmailTaken);
        }

        let user = User {
            email: key.clone(),
            display_name: name.to_string(),
            password_hash: hash_password(password)?,
            created_at: Utc::now(),
        };
        users.insert(key, user.clone());
        self.save(&users)?;

        log::info!("registered account {}", user.email);
        Ok(user)
    }

    /// Check credentials, returning the account when they match
    pub fn verify(&self, email: &str, password: &str) -> Result<Option<User>, AuthError> {
        let users = self.load()?;
        let Some(user) = users.get(&email.trim().to_lowercase()) else {
            return Ok(None);
        };

        if verify_password(password, &user.password_hash)? {
            Ok(Some(user.clone()))
        } else {
            Ok(None)
        }
    }
}

/// Hash a password using Argon2
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::Hash)
}

/// Verify a password against a stored hash
fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AuthError::Store("invalid password hash format".into()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Session of the requesting browser, if signed in
///
/// Handlers take this as an argument instead of reading shared state.
pub struct CurrentSession(pub Option<Session>);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentSession {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let session = jar
            .get(SESSION_COOKIE)
            .and_then(|cookie| state.sessions.get(cookie.value()));
        Ok(CurrentSession(session))
    }
}

pub(crate) fn session_cookie(session: &Session) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session.id.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::MissingFields
            | AuthError::EmailTaken
            | AuthError::StateMismatch
            | AuthError::InvalidIdentity(_) => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::Provider(_) => StatusCode::BAD_GATEWAY,
            AuthError::ProviderNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Store(_) | AuthError::Hash => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            log::error!("authentication failure: {}", self);
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

// Web handler functions below

pub async fn serve_login_page() -> Html<&'static str> {
    Html(include_str!("./static/login.html"))
}

/// Handle user registration
///
/// Creates the account and sends the browser to the login page.
pub async fn handle_signup(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SignupForm>,
) -> Result<Redirect, AuthError> {
    state.users.register(&form.name, &form.email, &form.password)?;
    Ok(Redirect::to("/login?registered=true"))
}

/// Handle user login requests
///
/// Verifies the credentials, opens a session and stores its id in a cookie.
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(credentials): Form<LoginForm>,
) -> Result<(CookieJar, Redirect), AuthError> {
    let user = state
        .users
        .verify(&credentials.email, &credentials.password)?
        .ok_or(AuthError::InvalidCredentials)?;

    let session = state.sessions.create(Identity::from_user(&user)?);
    Ok((jar.add(session_cookie(&session)), Redirect::to("/")))
}

/// Handle user logout
///
/// Revokes the session and clears the cookie.
pub async fn handle_logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Some(session) = state.sessions.revoke(cookie.value()) {
            log::info!("closed session for {}", session.email);
        }
    }

    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        Redirect::to("/"),
    )
}

/// The signed-in user, or 401
pub async fn current_user(CurrentSession(session): CurrentSession) -> Response {
    match session {
        Some(session) => Json(session).into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "Not signed in" })),
        )
            .into_response(),
    }
}
