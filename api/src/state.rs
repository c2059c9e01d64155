use galuchat_mcp_runtime::rpc::McpServer;

pub const DEFAULT_URL_PREFIX: &str = "/mcp";
pub const DEFAULT_RATE_LIMIT_PER_SEC: u32 = 5;

/// HTTP-surface settings, separate from the provider/runtime config.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceSettings {
    /// Normalized: empty, or a leading slash without a trailing one
    pub url_prefix: String,
    pub rate_limit_per_sec: u32,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            url_prefix: DEFAULT_URL_PREFIX.to_string(),
            rate_limit_per_sec: DEFAULT_RATE_LIMIT_PER_SEC,
        }
    }
}

impl ServiceSettings {
    pub fn from_env() -> Self {
        let url_prefix = std::env::var("MCP_URL_PREFIX")
            .map(|raw| normalize_prefix(&raw))
            .unwrap_or_else(|_| DEFAULT_URL_PREFIX.to_string());
        let rate_limit_per_sec = std::env::var("GALUCHAT_RATE_LIMIT_PER_SEC")
            .ok()
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .filter(|rate| *rate > 0)
            .unwrap_or(DEFAULT_RATE_LIMIT_PER_SEC);
        Self {
            url_prefix,
            rate_limit_per_sec,
        }
    }

    /// `{prefix}{suffix}`, where `suffix` starts with `/`.
    pub fn path(&self, suffix: &str) -> String {
        format!("{}{}", self.url_prefix, suffix)
    }
}

pub fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

#[derive(Clone)]
pub struct AppState {
    pub mcp: McpServer,
    pub settings: ServiceSettings,
}
