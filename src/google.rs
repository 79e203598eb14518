//! Google sign-in
//!
//! The browser is sent to Google's consent page with a one-time `state`
//! value. On the way back the authorization code is exchanged for an access
//! token, the OpenID userinfo document is fetched, and the profile is
//! validated into an [`Identity`] before a session is opened.

use crate::app::AppState;
use crate::config::GoogleConfig;
use crate::error::AuthError;
use crate::login::{Identity, Provider, session_cookie};
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const SCOPES: &str = "openid email profile";

/// Pending sign-ins older than this are refused
const STATE_TTL_MINUTES: i64 = 10;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Profile returned by the userinfo endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    pub sub: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub picture: Option<String>,
}

impl TryFrom<GoogleProfile> for Identity {
    type Error = AuthError;

    fn try_from(profile: GoogleProfile) -> Result<Self, Self::Error> {
        if profile.email_verified == Some(false) {
            return Err(AuthError::InvalidIdentity("email address not verified".into()));
        }
        let email = profile
            .email
            .as_deref()
            .ok_or_else(|| AuthError::InvalidIdentity("missing email".into()))?;

        Identity::new(
            &profile.sub,
            profile.name.as_deref(),
            email,
            profile.picture.as_deref(),
            Provider::Google,
        )
    }
}

pub struct GoogleClient {
    config: GoogleConfig,
    http: reqwest::Client,
    pending: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl GoogleClient {
    pub fn new(config: GoogleConfig) -> Self {
        GoogleClient {
            config,
            http: reqwest::Client::new(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Start a sign-in, returning the consent page URL to redirect to
    pub fn begin(&self) -> String {
        let state = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.retain(|_, started| now - *started < chrono::Duration::minutes(STATE_TTL_MINUTES));
        pending.insert(state.clone(), now);

        self.authorize_url(&state)
    }

    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&prompt=select_account",
            AUTHORIZE_URL,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_url),
            urlencoding::encode(SCOPES),
            urlencoding::encode(state),
        )
    }

    /// Consume a state value; each one is good for a single callback
    fn take_state(&self, state: &str) -> Result<(), AuthError> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        match pending.remove(state) {
            Some(started)
                if Utc::now() - started < chrono::Duration::minutes(STATE_TTL_MINUTES) =>
            {
                Ok(())
            }
            _ => Err(AuthError::StateMismatch),
        }
    }

    /// Finish a sign-in from the callback parameters
    pub async fn complete(&self, code: &str, state: &str) -> Result<Identity, AuthError> {
        self.take_state(state)?;

        let token: TokenResponse = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| AuthError::Provider(format!("token exchange failed: {}", e)))?
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("invalid token response: {}", e)))?;

        let profile: GoogleProfile = self
            .http
            .get(USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| AuthError::Provider(format!("userinfo request failed: {}", e)))?
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("invalid userinfo response: {}", e)))?;

        Identity::try_from(profile)
    }
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Redirect to Google's consent page
pub async fn google_start(State(state): State<Arc<AppState>>) -> Response {
    match &state.google {
        Some(google) => Redirect::to(&google.begin()).into_response(),
        None => AuthError::ProviderNotConfigured.into_response(),
    }
}

/// Handle the provider's redirect back to us
pub async fn google_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let Some(google) = &state.google else {
        return AuthError::ProviderNotConfigured.into_response();
    };

    if let Some(error) = query.error {
        log::warn!("Google sign-in was refused: {}", error);
        return login_error_redirect(&error);
    }

    let (Some(code), Some(oauth_state)) = (query.code, query.state) else {
        return login_error_redirect("missing authorization code");
    };

    match google.complete(&code, &oauth_state).await {
        Ok(identity) => {
            let session = state.sessions.create(identity);
            (jar.add(session_cookie(&session)), Redirect::to("/")).into_response()
        }
        Err(e) => {
            log::warn!("Google sign-in failed: {}", e);
            login_error_redirect(&e.to_string())
        }
    }
}

fn login_error_redirect(message: &str) -> Response {
    Redirect::to(&format!("/login?error={}", urlencoding::encode(message))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GoogleClient {
        GoogleClient::new(GoogleConfig {
            client_id: "client id".into(),
            client_secret: "secret".into(),
            redirect_url: "http://localhost:3000/auth/callback".into(),
        })
    }

    fn profile() -> GoogleProfile {
        GoogleProfile {
            sub: "1098".into(),
            name: Some("Wil Fred".into()),
            email: Some("wil@example.com".into()),
            email_verified: Some(true),
            picture: Some("https://lh3.googleusercontent.com/a/photo".into()),
        }
    }

    #[test]
    fn authorize_url_is_encoded() {
        let url = client().authorize_url("abc");
        assert!(url.starts_with(AUTHORIZE_URL));
        assert!(url.contains("client_id=client%20id"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fauth%2Fcallback"));
        assert!(url.contains("scope=openid%20email%20profile"));
        assert!(url.contains("state=abc"));
    }

    #[test]
    fn state_values_are_single_use() {
        let google = client();
        let url = google.begin();
        let state = url.rsplit("state=").next().unwrap().split('&').next().unwrap();

        assert!(google.take_state(state).is_ok());
        assert!(matches!(google.take_state(state), Err(AuthError::StateMismatch)));
        assert!(matches!(google.take_state("forged"), Err(AuthError::StateMismatch)));
    }

    #[test]
    fn profile_becomes_identity() {
        let identity = Identity::try_from(profile()).unwrap();
        assert_eq!(identity.email(), "wil@example.com");
        assert_eq!(identity.display_name(), "Wil Fred");
    }

    #[test]
    fn incomplete_profiles_are_rejected() {
        let mut missing_email = profile();
        missing_email.email = None;
        assert!(Identity::try_from(missing_email).is_err());

        let mut unverified = profile();
        unverified.email_verified = Some(false);
        assert!(Identity::try_from(unverified).is_err());

        let mut anonymous = profile();
        anonymous.sub = "  ".into();
        assert!(Identity::try_from(anonymous).is_err());
    }
}
