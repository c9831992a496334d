use std::fmt;

/// Custom error type for sumstream operations
/// Implements Clone for sending through channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error
{   /// Content was empty after trimming
    EmptyContent
  , /// A request is already active on this controller
    RequestAlreadyActive
  , /// Request parameters out of range
    InvalidParams(String)
  , /// Connection could not be established
    NetworkError(String)
  , /// Fault while reading the response body
    StreamError(String)
  , /// Invalid configuration
    InvalidConfiguration(String)
  , /// Controller loop is gone
    Disconnected
  , /// Generic error
    Other(String)
}

impl Error
{   /// Caller bugs: should be prevented, not handled
    pub fn is_usage_error(&self) -> bool
    {   matches!(
          self,
          Error::EmptyContent
            | Error::RequestAlreadyActive
            | Error::InvalidParams(_)
        )
    }

    /// Message without the category prefix
    pub fn detail(&self) -> String
    {   match self
        {   Error::InvalidParams(msg)
          | Error::NetworkError(msg)
          | Error::StreamError(msg)
          | Error::InvalidConfiguration(msg)
          | Error::Other(msg) => msg.clone()
          , other => other.to_string()
        }
    }
}

impl fmt::Display for Error
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   match self
        {   Error::EmptyContent => {
              write!(f, "Content is empty")
            }
          , Error::RequestAlreadyActive => {
              write!(f,
                "A request is already active; cancel it first"
              )
            }
          , Error::InvalidParams(msg) => {
              write!(f, "Invalid request parameters: {}", msg)
            }
          , Error::NetworkError(msg) => {
              write!(f, "Network error: {}", msg)
            }
          , Error::StreamError(msg) => {
              write!(f, "Stream error: {}", msg)
            }
          , Error::InvalidConfiguration(msg) => {
              write!(f, "Invalid configuration: {}", msg)
            }
          , Error::Disconnected => {
              write!(f, "Request controller disconnected")
            }
          , Error::Other(msg) => {
              write!(f, "Error: {}", msg)
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<String> for Error
{   fn from(s: String) -> Self
    {   Error::Other(s)
    }
}

impl From<&str> for Error
{   fn from(s: &str) -> Self
    {   Error::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests
{   use super::*;

    #[test]
    fn test_usage_errors()
    {   assert!(Error::EmptyContent.is_usage_error());
        assert!(Error::RequestAlreadyActive.is_usage_error());
        assert!(
          Error::InvalidParams("percent".into()).is_usage_error()
        );
        assert!(
          !Error::NetworkError("refused".into()).is_usage_error()
        );
        assert!(!Error::Disconnected.is_usage_error());
    }

    #[test]
    fn test_display()
    {   assert_eq!(
          Error::StreamError("reset".into()).to_string(),
          "Stream error: reset"
        );
        assert_eq!(
          Error::from("boom"),
          Error::Other("boom".to_string())
        );
    }
}
