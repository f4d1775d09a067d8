use std::env;
use std::fmt;
use std::net::SocketAddr;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_WEBHOOK_PATH: &str = "/";
/// Slack caps section text at 3000 characters; the code fences need a few of them.
pub const DEFAULT_BLOCK_CHUNK_SIZE: usize = 2900;
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_ICON_EMOJI: &str = ":envelope_with_arrow:";

/// How to treat a form body that cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyPolicy {
    /// Relay the raw body text instead.
    #[default]
    BestEffort,
    /// Reject the request with 400.
    Strict,
}

#[derive(Clone)]
pub struct AppConfig {
    pub slack_bot_token: String,
    pub slack_channel_id: String,
    pub slack_icon_emoji: String,
    pub listen_addr: SocketAddr,
    pub webhook_path: String,
    pub block_chunk_size: usize,
    pub body_policy: BodyPolicy,
    pub audit_log: bool,
    pub max_body_bytes: usize,
}

impl AppConfig {
    /// # Errors
    ///
    /// Returns a message naming the variable when a value is present but invalid.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns a message naming the variable when a value is present but invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string());

        let listen_addr = get("LISTEN_ADDR")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| format!("LISTEN_ADDR: {e}"))?;

        let block_chunk_size = match get("BLOCK_CHUNK_SIZE").filter(|v| !v.is_empty()) {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| format!("BLOCK_CHUNK_SIZE: expected a positive integer, got {raw:?}"))?,
            None => DEFAULT_BLOCK_CHUNK_SIZE,
        };

        let max_body_bytes = match get("MAX_BODY_BYTES").filter(|v| !v.is_empty()) {
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|e| format!("MAX_BODY_BYTES: {e}"))?,
            None => DEFAULT_MAX_BODY_BYTES,
        };

        let body_policy = if parse_flag("STRICT_BODY", get("STRICT_BODY"), false)? {
            BodyPolicy::Strict
        } else {
            BodyPolicy::BestEffort
        };

        let webhook_path = get("WEBHOOK_PATH")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_WEBHOOK_PATH.to_string());
        if !webhook_path.starts_with('/') {
            return Err(format!("WEBHOOK_PATH: must start with '/', got {webhook_path:?}"));
        }

        Ok(Self {
            slack_bot_token: get("SLACK_BOT_TOKEN").unwrap_or_default(),
            slack_channel_id: get("SLACK_CHANNEL_ID").unwrap_or_default(),
            slack_icon_emoji: get("SLACK_ICON_EMOJI")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_ICON_EMOJI.to_string()),
            listen_addr,
            webhook_path,
            block_chunk_size,
            body_policy,
            audit_log: parse_flag("AUDIT_LOG", get("AUDIT_LOG"), true)?,
            max_body_bytes,
        })
    }

    /// Both the token and the channel are required before anything is sent to Slack.
    #[must_use]
    pub fn relay_available(&self) -> bool {
        !self.slack_bot_token.is_empty() && !self.slack_channel_id.is_empty()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            slack_bot_token: String::new(),
            slack_channel_id: String::new(),
            slack_icon_emoji: DEFAULT_ICON_EMOJI.to_string(),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            webhook_path: DEFAULT_WEBHOOK_PATH.to_string(),
            block_chunk_size: DEFAULT_BLOCK_CHUNK_SIZE,
            body_policy: BodyPolicy::BestEffort,
            audit_log: true,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

// The token must never end up in a log line.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.slack_bot_token.is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        };
        f.debug_struct("AppConfig")
            .field("slack_bot_token", &token)
            .field("slack_channel_id", &self.slack_channel_id)
            .field("slack_icon_emoji", &self.slack_icon_emoji)
            .field("listen_addr", &self.listen_addr)
            .field("webhook_path", &self.webhook_path)
            .field("block_chunk_size", &self.block_chunk_size)
            .field("body_policy", &self.body_policy)
            .field("audit_log", &self.audit_log)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}

fn parse_flag(key: &str, value: Option<String>, default: bool) -> Result<bool, String> {
    let Some(raw) = value.filter(|v| !v.is_empty()) else {
        return Ok(default);
    };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(format!("{key}: expected a boolean, got {raw:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.listen_addr.to_string(), DEFAULT_LISTEN_ADDR);
        assert_eq!(config.webhook_path, "/");
        assert_eq!(config.block_chunk_size, 2900);
        assert_eq!(config.body_policy, BodyPolicy::BestEffort);
        assert!(config.audit_log);
        assert_eq!(config.slack_icon_emoji, ":envelope_with_arrow:");
        assert!(!config.relay_available());
    }

    #[test]
    fn relay_requires_both_token_and_channel() {
        let token_only = config_from(&[("SLACK_BOT_TOKEN", "xoxb-1")]).unwrap();
        assert!(!token_only.relay_available());

        let channel_only = config_from(&[("SLACK_CHANNEL_ID", "C123")]).unwrap();
        assert!(!channel_only.relay_available());

        let both = config_from(&[("SLACK_BOT_TOKEN", "xoxb-1"), ("SLACK_CHANNEL_ID", "C123")])
            .unwrap();
        assert!(both.relay_available());
    }

    #[test]
    fn whitespace_only_credentials_count_as_missing() {
        let config =
            config_from(&[("SLACK_BOT_TOKEN", "  "), ("SLACK_CHANNEL_ID", "C123")]).unwrap();
        assert!(!config.relay_available());
    }

    #[test]
    fn parses_overrides() {
        let config = config_from(&[
            ("LISTEN_ADDR", "127.0.0.1:9000"),
            ("WEBHOOK_PATH", "/hook"),
            ("BLOCK_CHUNK_SIZE", "100"),
            ("STRICT_BODY", "yes"),
            ("AUDIT_LOG", "off"),
            ("MAX_BODY_BYTES", "1024"),
        ])
        .unwrap();
        assert_eq!(config.listen_addr.port(), 9000);
        assert_eq!(config.webhook_path, "/hook");
        assert_eq!(config.block_chunk_size, 100);
        assert_eq!(config.body_policy, BodyPolicy::Strict);
        assert!(!config.audit_log);
        assert_eq!(config.max_body_bytes, 1024);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(config_from(&[("BLOCK_CHUNK_SIZE", "0")]).is_err());
        assert!(config_from(&[("BLOCK_CHUNK_SIZE", "many")]).is_err());
        assert!(config_from(&[("STRICT_BODY", "maybe")]).is_err());
        assert!(config_from(&[("LISTEN_ADDR", "nowhere")]).is_err());
        assert!(config_from(&[("WEBHOOK_PATH", "hook")]).is_err());
    }

    #[test]
    fn debug_output_hides_the_token() {
        let config = config_from(&[("SLACK_BOT_TOKEN", "xoxb-secret")]).unwrap();
        let printed = format!("{config:?}");
        assert!(!printed.contains("xoxb-secret"));
        assert!(printed.contains("<redacted>"));
    }
}
