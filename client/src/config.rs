use std::collections::BTreeMap;
use std::num::ParseIntError;
use std::time::Duration;

/// Defaults applied to every request sent through an
/// [`HttpClient`](crate::HttpClient).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientConfig {
    /// Prefix for relative request urls.
    pub base_url: Option<String>,
    /// Headers added to requests that don't already set them.
    pub headers: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("API_TIMEOUT_MS must be a number of milliseconds, got {value:?}")]
    InvalidTimeout {
        value: String,
        #[source]
        source: ParseIntError,
    },
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read configuration from the environment, loading a `.env` file first
    /// if one exists.
    ///
    /// - `API_BASE_URL`: prefix for relative urls
    /// - `API_TIMEOUT_MS`: request timeout in milliseconds
    pub fn from_env() -> Result<Self, ConfigError> {
        use std::env::var;

        let _ = dotenvy::dotenv();
        Self::from_vars(var("API_BASE_URL").ok(), var("API_TIMEOUT_MS").ok())
    }

    fn from_vars(
        base_url: Option<String>,
        timeout_ms: Option<String>,
    ) -> Result<Self, ConfigError> {
        let timeout = match timeout_ms {
            Some(value) => {
                let ms = value.trim().parse::<u64>().map_err(|source| {
                    ConfigError::InvalidTimeout {
                        value: value.clone(),
                        source,
                    }
                })?;
                Some(Duration::from_millis(ms))
            }
            None => None,
        };

        Ok(Self {
            base_url: base_url.filter(|url| !url.trim().is_empty()),
            timeout,
            ..Self::default()
        })
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Join a request url onto the base url. Absolute urls are left alone.
    pub fn resolve_url(&self, url: &str) -> String {
        let absolute = url.starts_with("http://") || url.starts_with("https://");
        match &self.base_url {
            Some(base) if !absolute => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                url.trim_start_matches('/')
            ),
            _ => url.to_string(),
        }
    }
}
