use super::error::{VkApiError, VkResult};

const DEFAULT_API_BASE: &str = "https://api.vk.com/method";
const DEFAULT_API_VERSION: &str = "5.131";
const DEFAULT_WAIT_SECS: u64 = 25;

/// Runtime configuration describing how to reach the VK group API.
#[derive(Debug, Clone)]
pub struct VkConfig {
    pub api_base: String,
    pub api_version: String,
    pub token: String,
    pub group_id: i64,
    /// Seconds the long-poll server may hold a request open.
    pub wait_secs: u64,
}

impl VkConfig {
    /// Construct a configuration for the given group token.
    pub fn new(token: impl Into<String>, group_id: i64) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.into(),
            api_version: DEFAULT_API_VERSION.into(),
            token: token.into(),
            group_id,
            wait_secs: DEFAULT_WAIT_SECS,
        }
    }

    /// Point the client at another API host (proxies, test servers).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Build a configuration by reading the expected environment variables.
    pub fn from_env() -> VkResult<Self> {
        let token = std::env::var("VK_TOKEN")
            .map_err(|_| VkApiError::MissingEnvVar { var: "VK_TOKEN" })?;
        let raw_group = std::env::var("VK_GROUP_ID")
            .map_err(|_| VkApiError::MissingEnvVar { var: "VK_GROUP_ID" })?;
        let group_id = raw_group
            .trim()
            .parse::<i64>()
            .map_err(|_| VkApiError::InvalidEnvVar {
                var: "VK_GROUP_ID",
                value: raw_group.clone(),
            })?;

        let mut config = Self::new(token, group_id);

        if let Ok(api_base) = std::env::var("VK_API_BASE") {
            config = config.with_api_base(api_base);
        }
        if let Ok(version) = std::env::var("VK_API_VERSION") {
            config.api_version = version;
        }
        if let Some(wait) = std::env::var("VK_LONG_POLL_WAIT")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
        {
            config.wait_secs = wait;
        }

        Ok(config)
    }
}
