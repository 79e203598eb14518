use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Upper bound for session and idle-workspace lifetimes (one year)
pub const MAX_SESSION_HOURS: i64 = 24 * 365;

/// Web server configuration
///
/// Every option can come from the command line or from its environment
/// variable; the command line wins.
#[derive(Debug, Clone, Parser)]
#[command(name = "autogroup", version, about = "Auto Group Generator web server")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "AUTOGROUP_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Directory holding users.json
    #[arg(long, env = "AUTOGROUP_DATA_DIR", default_value = "database")]
    pub data_dir: PathBuf,

    /// Directory served under /static
    #[arg(long, env = "AUTOGROUP_STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,

    /// Lifetime of sign-in sessions and idle workspaces, in hours
    #[arg(
        long,
        env = "AUTOGROUP_SESSION_HOURS",
        default_value_t = 24,
        value_parser = clap::value_parser!(i64).range(1..=MAX_SESSION_HOURS)
    )]
    pub session_hours: i64,

    /// OAuth client id for Google sign-in
    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    pub google_client_id: Option<String>,

    /// OAuth client secret for Google sign-in
    #[arg(long, env = "GOOGLE_CLIENT_SECRET", hide_env_values = true)]
    pub google_client_secret: Option<String>,

    /// Callback URL registered with Google, e.g. http://localhost:3000/auth/callback
    #[arg(long, env = "GOOGLE_REDIRECT_URL")]
    pub google_redirect_url: Option<String>,
}

/// Credentials needed to run the Google sign-in flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

impl Config {
    /// Google settings, present only when all three values are set
    pub fn google(&self) -> Option<GoogleConfig> {
        match (
            &self.google_client_id,
            &self.google_client_secret,
            &self.google_redirect_url,
        ) {
            (Some(id), Some(secret), Some(redirect)) => Some(GoogleConfig {
                client_id: id.clone(),
                client_secret: secret.clone(),
                redirect_url: redirect.clone(),
            }),
            _ => None,
        }
    }

    pub fn users_file(&self) -> PathBuf {
        self.data_dir.join("users.json")
    }

    /// Session lifetime, kept between one hour and [`MAX_SESSION_HOURS`]
    pub fn session_lifetime(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_hours.clamp(1, MAX_SESSION_HOURS))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            data_dir: PathBuf::from("database"),
            static_dir: PathBuf::from("static"),
            session_hours: 24,
            google_client_id: None,
            google_client_secret: None,
            google_redirect_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_values_are_parsed() {
        let config = Config::try_parse_from([
            "autogroup",
            "--bind",
            "0.0.0.0:8080",
            "--data-dir",
            "/tmp/groups",
            "--session-hours",
            "2",
        ])
        .unwrap();

        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.users_file(), PathBuf::from("/tmp/groups/users.json"));
        assert_eq!(config.session_lifetime(), chrono::Duration::hours(2));
    }

    #[test]
    fn google_needs_all_three_settings() {
        let mut config = Config {
            google_client_id: Some("id".into()),
            google_client_secret: Some("secret".into()),
            ..Config::default()
        };
        assert!(config.google().is_none());

        config.google_redirect_url = Some("http://localhost:3000/auth/callback".into());
        assert_eq!(
            config.google().map(|g| g.client_id),
            Some("id".to_string())
        );
    }

    #[test]
    fn session_lifetime_is_at_least_an_hour() {
        let config = Config {
            session_hours: 0,
            ..Config::default()
        };
        assert_eq!(config.session_lifetime(), chrono::Duration::hours(1));
    }

    #[test]
    fn oversized_session_lifetime_is_capped() {
        let config = Config {
            session_hours: i64::MAX,
            ..Config::default()
        };
        assert_eq!(
            config.session_lifetime(),
            chrono::Duration::hours(MAX_SESSION_HOURS)
        );

        let parsed = Config::try_parse_from([
            "autogroup",
            "--session-hours",
            "9223372036854775807",
        ]);
        assert!(parsed.is_err());
    }
}
