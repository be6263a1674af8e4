//! Client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Production address of the Fiddle service
pub const DEFAULT_ADDRESS: &str = "https://fiddle.fastlydemo.net";

const DEFAULT_USER_AGENT: &str = concat!("fiddle-client/", env!("CARGO_PKG_VERSION"));

/// Bounds on how long the result stream is consumed
///
/// Every received event costs one attempt. `poll_delay` is slept between
/// attempts but not after the last one, so the worst-case wait is
/// `(max_attempts - 1) * poll_delay` plus the time spent waiting for events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StreamConfig {
    pub max_attempts: u32,
    #[serde(rename = "pollDelayMs", with = "duration_ms")]
    pub poll_delay: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_attempts: 100,
            poll_delay: Duration::from_secs(5),
        }
    }
}

impl StreamConfig {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_poll_delay(mut self, poll_delay: Duration) -> Self {
        self.poll_delay = poll_delay;
        self
    }
}

/// Configuration for [`crate::FiddleClient`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    /// Base address every request path is appended to
    pub address: Url,
    pub user_agent: String,
    pub stream: StreamConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            stream: StreamConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn with_address(mut self, address: Url) -> Self {
        self.address = address;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_stream(mut self, stream: StreamConfig) -> Self {
        self.stream = stream;
        self
    }

    /// Absolute URL for `path`, keeping any path prefix of the address
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.address.as_str().trim_end_matches('/'), path)
    }
}

fn default_address() -> Url {
    Url::parse(DEFAULT_ADDRESS).expect("default address is a valid URL")
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
