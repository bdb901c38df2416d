//! Websocket endpoint addressing.
//!
//! Bybit exposes one websocket path per channel and contract family:
//! `wss://<host>/<api_version>/<channel>/<cover>`.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use url::Url;

use crate::error::{ConfigError, Result};

/// Default public stream host.
pub const DEFAULT_HOST: &str = "stream.bybit.com";

/// Default API version path segment.
pub const DEFAULT_API_VERSION: &str = "v5";

/// Whether the stream carries public market data or private account data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    #[default]
    Public,
    Private,
}

impl ChannelType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

/// Contract family served by the stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverType {
    #[default]
    Spot,
    Linear,
    Inverse,
    Option,
}

impl CoverType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Spot => "spot",
            Self::Linear => "linear",
            Self::Inverse => "inverse",
            Self::Option => "option",
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for CoverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelType {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            other => Err(ConfigError::InvalidValue {
                field: "channel",
                reason: format!("unknown channel type '{other}'"),
            }),
        }
    }
}

impl FromStr for CoverType {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "spot" => Ok(Self::Spot),
            "linear" => Ok(Self::Linear),
            "inverse" => Ok(Self::Inverse),
            "option" => Ok(Self::Option),
            other => Err(ConfigError::InvalidValue {
                field: "cover",
                reason: format!("unknown cover type '{other}'"),
            }),
        }
    }
}

/// A fully specified stream endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub api_version: String,
    pub channel: ChannelType,
    pub cover: CoverType,
}

impl Endpoint {
    #[must_use]
    pub fn new(host: impl Into<String>, api_version: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            api_version: api_version.into(),
            channel: ChannelType::default(),
            cover: CoverType::default(),
        }
    }

    #[must_use]
    pub const fn with_channel(mut self, channel: ChannelType) -> Self {
        self.channel = channel;
        self
    }

    #[must_use]
    pub const fn with_cover(mut self, cover: CoverType) -> Self {
        self.cover = cover;
        self
    }

    /// The request path, e.g. `/v5/public/spot`.
    #[must_use]
    pub fn path(&self) -> String {
        format!("/{}/{}/{}", self.api_version, self.channel, self.cover)
    }

    /// Build the `wss://` URL for this endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the host does not form a valid URL.
    pub fn url(&self) -> Result<Url> {
        let url = Url::parse(&format!("wss://{}{}", self.host, self.path()))?;
        Ok(url)
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_API_VERSION)
    }
}
