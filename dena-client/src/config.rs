/// Client configuration for endpoints and transport parameters
use crate::error::{ClientError, Result};
use reqwest::Url;
use std::time::Duration;

pub const DEFAULT_BASE_ENDPOINT: &str = "https://database.deta.sh";
pub const DEFAULT_DRIVE_ENDPOINT: &str = "https://drive.deta.sh";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Root URL of the Base service. `/v1/<projectId>/<baseName>` is appended.
    pub base_endpoint: String,

    /// Root URL of the Drive service
    pub drive_endpoint: String,

    /// Per-request timeout (None = no client-side timeout)
    pub timeout: Option<Duration>,

    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_endpoint: DEFAULT_BASE_ENDPOINT.to_string(),
            drive_endpoint: DEFAULT_DRIVE_ENDPOINT.to_string(),
            timeout: None,
            user_agent: concat!("dena-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Point Base collections at a different service root
    pub fn with_base_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.base_endpoint = endpoint.into();
        self
    }

    /// Point Drive handles at a different service root
    pub fn with_drive_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.drive_endpoint = endpoint.into();
        self
    }

    /// Abort requests that take longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        parse_endpoint("base_endpoint", &self.base_endpoint)?;
        parse_endpoint("drive_endpoint", &self.drive_endpoint)?;

        if self.timeout == Some(Duration::ZERO) {
            return Err(ClientError::InvalidArgument(
                "timeout must be greater than 0 when set".to_string(),
            ));
        }

        Ok(())
    }

    pub(crate) fn base_url(&self) -> Result<Url> {
        parse_endpoint("base_endpoint", &self.base_endpoint)
    }

    pub(crate) fn drive_url(&self) -> Result<Url> {
        parse_endpoint("drive_endpoint", &self.drive_endpoint)
    }
}

fn parse_endpoint(field: &str, endpoint: &str) -> Result<Url> {
    let url = Url::parse(endpoint)
        .map_err(|e| ClientError::InvalidArgument(format!("{} '{}': {}", field, endpoint, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ClientError::InvalidArgument(format!(
            "{} must use http or https, got '{}'",
            field, other
        ))),
    }
}
