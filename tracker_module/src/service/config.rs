use std::env;

use super::BoxError;

/// OAuth scopes requested at install time.
pub const OAUTH_SCOPES: &str = "chat:write,users:read,im:history,im:read";

/// Full resync cadence: every 10 minutes.
const DEFAULT_SYNC_CRON: &str = "0 */10 * * * *";
/// Daily digest delivery at 19:00.
const DEFAULT_DIGEST_CRON: &str = "0 0 19 * * *";

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// Dashboard origin; OAuth results and errors redirect here.
    pub frontend_url: String,
    pub jwt_secret: String,
    /// Slack OAuth client ID; install route is disabled without it.
    pub slack_client_id: Option<String>,
    /// Slack OAuth client secret.
    pub slack_client_secret: Option<String>,
    /// OAuth redirect URI; defaults to this service's /auth/callback.
    pub slack_redirect_uri: Option<String>,
    /// 6-field cron expression driving the full-resync batch job.
    pub sync_cron: String,
    /// 6-field cron expression driving digest delivery.
    pub digest_cron: String,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, BoxError> {
        dotenvy::dotenv().ok();

        let host = env::var("TRACKER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("TRACKER_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);

        let frontend_url = env::var("FRONTEND_URL")
            .ok()
            .map(|value| value.trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "http://localhost:5173".to_string());

        let jwt_secret = env::var("JWT_SECRET")
            .ok()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "slack-dm-tracker-secret-key".to_string());

        let slack_client_id = env::var("SLACK_CLIENT_ID").ok().filter(|s| !s.is_empty());
        let slack_client_secret = env::var("SLACK_CLIENT_SECRET")
            .ok()
            .filter(|s| !s.is_empty());
        let slack_redirect_uri = env::var("SLACK_REDIRECT_URI")
            .ok()
            .filter(|s| !s.is_empty());

        let sync_cron = env::var("SYNC_CRON")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SYNC_CRON.to_string());
        let digest_cron = env::var("DIGEST_CRON")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_DIGEST_CRON.to_string());

        Ok(Self {
            host,
            port,
            frontend_url,
            jwt_secret,
            slack_client_id,
            slack_client_secret,
            slack_redirect_uri,
            sync_cron,
            digest_cron,
        })
    }

    /// Redirect URI registered with the provider, defaulting to this
    /// service's own callback route.
    pub fn redirect_uri(&self) -> String {
        self.slack_redirect_uri
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}/auth/callback", self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    struct EnvGuard {
        key: String,
        previous: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let previous = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                previous,
            }
        }

        fn unset(key: &str) -> Self {
            let previous = env::var(key).ok();
            env::remove_var(key);
            Self {
                key: key.to_string(),
                previous,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.previous {
                Some(value) => env::set_var(&self.key, value),
                None => env::remove_var(&self.key),
            }
        }
    }

    #[test]
    fn defaults_apply_when_env_is_empty() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _guards = [
            EnvGuard::unset("TRACKER_HOST"),
            EnvGuard::unset("TRACKER_PORT"),
            EnvGuard::unset("FRONTEND_URL"),
            EnvGuard::unset("SLACK_CLIENT_ID"),
            EnvGuard::unset("SLACK_REDIRECT_URI"),
            EnvGuard::unset("SYNC_CRON"),
            EnvGuard::unset("DIGEST_CRON"),
        ];

        let config = ServiceConfig::from_env().expect("config");
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3001);
        assert_eq!(config.frontend_url, "http://localhost:5173");
        assert_eq!(config.sync_cron, DEFAULT_SYNC_CRON);
        assert_eq!(config.digest_cron, DEFAULT_DIGEST_CRON);
        assert!(config.slack_client_id.is_none());
        assert_eq!(
            config.redirect_uri(),
            "http://localhost:3001/auth/callback"
        );
    }

    #[test]
    fn env_overrides_are_honored() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _guards = [
            EnvGuard::set("TRACKER_PORT", "8080"),
            EnvGuard::set("FRONTEND_URL", "https://dash.example.com/"),
            EnvGuard::set("SLACK_CLIENT_ID", "123.456"),
            EnvGuard::set("SLACK_REDIRECT_URI", "https://api.example.com/auth/callback"),
            EnvGuard::set("SYNC_CRON", "0 */5 * * * *"),
        ];

        let config = ServiceConfig::from_env().expect("config");
        assert_eq!(config.port, 8080);
        // trailing slash is stripped so redirects compose cleanly
        assert_eq!(config.frontend_url, "https://dash.example.com");
        assert_eq!(config.slack_client_id.as_deref(), Some("123.456"));
        assert_eq!(
            config.redirect_uri(),
            "https://api.example.com/auth/callback"
        );
        assert_eq!(config.sync_cron, "0 */5 * * * *");
    }

    #[test]
    fn invalid_port_falls_back_to_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _guard = EnvGuard::set("TRACKER_PORT", "not-a-port");
        let config = ServiceConfig::from_env().expect("config");
        assert_eq!(config.port, 3001);
    }
}
