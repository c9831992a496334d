//! Configuration for the summarization endpoint and transport

use serde::{Deserialize, Serialize};
use std::path::Path;
use log::debug;

/// Endpoint used when nothing else is configured
pub const DEFAULT_ENDPOINT: &str
  = "http://localhost:6677/stream_summary/";

/// Environment variable overriding the endpoint
pub const ENDPOINT_ENV: &str = "SUMSTREAM_ENDPOINT";

/// Environment variable for the connect timeout in seconds
pub const CONNECT_TIMEOUT_ENV: &str
  = "SUMSTREAM_CONNECT_TIMEOUT_SECS";

/// Transport configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig
{   /// Connection establishment timeout in seconds
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>
  , /// Enable detailed logging of request bodies
    #[serde(default)]
    pub verbose: Option<bool>
}

/// Summarizer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarizerConfig
{   /// Full URL of the streaming summary endpoint
    pub endpoint: String
  , /// Transport settings
    #[serde(default)]
    pub transport: TransportConfig
}

impl Default for SummarizerConfig
{   fn default() -> Self
    {   SummarizerConfig
        {   endpoint: DEFAULT_ENDPOINT.to_string()
          , transport: TransportConfig::default()
        }
    }
}

impl SummarizerConfig
{   /// Config pointing at the given endpoint
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self
    {   SummarizerConfig
        {   endpoint: endpoint.into()
          , ..SummarizerConfig::default()
        }
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self, crate::error::Error>
    {   let mut config = SummarizerConfig::default();
        if let Ok(endpoint) = std::env::var(ENDPOINT_ENV)
        {   debug!("Endpoint from {}: {}", ENDPOINT_ENV, endpoint);
            config.endpoint = endpoint;
        }
        if let Ok(raw) = std::env::var(CONNECT_TIMEOUT_ENV)
        {   let secs = raw.trim().parse::<u64>().map_err(|e| {
              crate::error::Error::InvalidConfiguration(
                format!("{}: {}", CONNECT_TIMEOUT_ENV, e)
              )
            })?;
            config.transport.connect_timeout_secs = Some(secs);
        }
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>)
      -> Result<Self, crate::error::Error>
    {   let path = path.as_ref();
        debug!("Loading config from {}", path.display());
        let raw = std::fs::read_to_string(path).map_err(|e| {
          crate::error::Error::InvalidConfiguration(
            format!("{}: {}", path.display(), e)
          )
        })?;
        let config: SummarizerConfig
          = serde_json::from_str(&raw).map_err(|e| {
            crate::error::Error::InvalidConfiguration(e.to_string())
          })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the endpoint is an absolute http(s) URL
    pub fn validate(&self) -> Result<(), crate::error::Error>
    {   let url = reqwest::Url::parse(&self.endpoint).map_err(|e| {
          crate::error::Error::InvalidConfiguration(
            format!("endpoint {:?}: {}", self.endpoint, e)
          )
        })?;
        match url.scheme()
        {   "http" | "https" => Ok(())
          , other => Err(crate::error::Error::InvalidConfiguration(
              format!("unsupported scheme: {}", other)
            ))
        }
    }
}

#[cfg(test)]
mod tests
{   use super::*;

    #[test]
    fn test_default_is_valid()
    {   let config = SummarizerConfig::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_endpoints()
    {   assert!(
          SummarizerConfig::with_endpoint("not a url")
            .validate()
            .is_err()
        );
        assert!(
          SummarizerConfig::with_endpoint("ftp://host/summary")
            .validate()
            .is_err()
        );
    }

    // the only test touching these variables, so no cross-test races
    #[test]
    fn test_from_env_overrides()
    {   std::env::set_var(ENDPOINT_ENV, "http://10.0.0.5:8080/summary/");
        std::env::set_var(CONNECT_TIMEOUT_ENV, " 7 ");
        let config = SummarizerConfig::from_env().unwrap();
        assert_eq!(config.endpoint, "http://10.0.0.5:8080/summary/");
        assert_eq!(config.transport.connect_timeout_secs, Some(7));

        std::env::set_var(CONNECT_TIMEOUT_ENV, "soon");
        assert!(matches!(
          SummarizerConfig::from_env(),
          Err(crate::error::Error::InvalidConfiguration(_))
        ));

        std::env::remove_var(CONNECT_TIMEOUT_ENV);
        std::env::set_var(ENDPOINT_ENV, "gopher://old/summary");
        assert!(matches!(
          SummarizerConfig::from_env(),
          Err(crate::error::Error::InvalidConfiguration(_))
        ));

        std::env::remove_var(ENDPOINT_ENV);
        assert_eq!(
          SummarizerConfig::from_env().unwrap(),
          SummarizerConfig::default()
        );
    }

    #[test]
    fn test_parse_json_without_transport()
    {   let config: SummarizerConfig = serde_json::from_str(
          r#"{"endpoint": "http://127.0.0.1:9000/s/"}"#
        ).unwrap();
        assert_eq!(config.endpoint, "http://127.0.0.1:9000/s/");
        assert_eq!(config.transport, TransportConfig::default());
    }
}
