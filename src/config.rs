use std::time::Duration;

/// Production base address of the Prosper investor API.
pub const DEFAULT_BASE_URL: &str = "https://api.prosper.com/v1/";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Clone)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

// Credentials stay out of debug output.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Config {
    /// Loads configuration from the process environment (and `.env`, if present).
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> anyhow::Result<String> {
            let value = lookup(key)
                .ok_or_else(|| anyhow::anyhow!("{} environment variable required", key))?;
            if value.trim().is_empty() {
                anyhow::bail!("{} cannot be empty", key);
            }
            Ok(value)
        };

        let config = Self {
            client_id: required("PROSPER_CLIENT_ID")?,
            client_secret: required("PROSPER_CLIENT_SECRET")?,
            username: required("PROSPER_USERNAME")?,
            password: required("PROSPER_PASSWORD")?,
            base_url: lookup("PROSPER_BASE_URL")
                .filter(|s| !s.trim().is_empty())
                .map(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("PROSPER_BASE_URL must start with http:// or https://");
                    }
                    url::Url::parse(&url).map_err(|e| {
                        anyhow::anyhow!("PROSPER_BASE_URL is not a valid URL: {}", e)
                    })?;
                    Ok(normalize_base_url(url))
                })
                .transpose()?
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout_secs: lookup("PROSPER_TIMEOUT_SECS")
                .map(|raw| {
                    raw.trim().parse::<u64>().map_err(|_| {
                        anyhow::anyhow!("PROSPER_TIMEOUT_SECS must be a whole number of seconds")
                    })
                })
                .transpose()?
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        };

        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Prosper base URL: {}", config.base_url);
        tracing::debug!("Request timeout: {}s", config.timeout_secs);

        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Resource paths are appended verbatim, so the base must end with a slash.
pub fn normalize_base_url(mut url: String) -> String {
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn credentials() -> Vec<(&'static str, &'static str)> {
        vec![
            ("PROSPER_CLIENT_ID", "id"),
            ("PROSPER_CLIENT_SECRET", "secret"),
            ("PROSPER_USERNAME", "investor@example.com"),
            ("PROSPER_PASSWORD", "hunter2"),
        ]
    }

    #[test]
    fn test_defaults_applied() {
        let env = vars(&credentials());
        let config = Config::from_lookup(|k| env.get(k).cloned()).unwrap();

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_missing_credential_rejected() {
        let env = vars(&credentials()[..3]);
        let err = Config::from_lookup(|k| env.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("PROSPER_PASSWORD"));
    }

    #[test]
    fn test_blank_credential_rejected() {
        let mut pairs = credentials();
        pairs[0] = ("PROSPER_CLIENT_ID", "   ");
        let env = vars(&pairs);
        assert!(Config::from_lookup(|k| env.get(k).cloned()).is_err());
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let mut pairs = credentials();
        pairs.push(("PROSPER_BASE_URL", "http://localhost:8080/v1"));
        let env = vars(&pairs);
        let config = Config::from_lookup(|k| env.get(k).cloned()).unwrap();
        assert_eq!(config.base_url, "http://localhost:8080/v1/");
    }

    #[test]
    fn test_base_url_scheme_validated() {
        let mut pairs = credentials();
        pairs.push(("PROSPER_BASE_URL", "ftp://api.prosper.com/v1/"));
        let env = vars(&pairs);
        assert!(Config::from_lookup(|k| env.get(k).cloned()).is_err());
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        let mut pairs = credentials();
        pairs.push(("PROSPER_TIMEOUT_SECS", "soon"));
        let env = vars(&pairs);
        assert!(Config::from_lookup(|k| env.get(k).cloned()).is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let env = vars(&credentials());
        let config = Config::from_lookup(|k| env.get(k).cloned()).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("\"secret\""));
    }
}
