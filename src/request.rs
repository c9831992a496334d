//! Summarization request parameters and wire body

use serde::{Deserialize, Serialize};

pub const DEFAULT_PERCENT: u8 = 30;
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Parameters of one summarization request
#[derive(Debug, Clone, PartialEq)]
pub struct RequestParams
{   /// Text to summarize
    pub content: String
  , /// Target length as a percentage of the input, 1..=100
    pub percent: u8
  , /// Bulleted list instead of a paragraph
    pub bullets: bool
  , /// Sampling temperature, 0.0..=1.0
    pub temperature: f32
}

impl RequestParams
{   /// Params with the service defaults
    pub fn new(content: impl Into<String>) -> Self
    {   RequestParams
        {   content: content.into()
          , percent: DEFAULT_PERCENT
          , bullets: false
          , temperature: DEFAULT_TEMPERATURE
        }
    }

    pub fn with_percent(mut self, percent: u8) -> Self
    {   self.percent = percent;
        self
    }

    pub fn with_bullets(mut self, bullets: bool) -> Self
    {   self.bullets = bullets;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self
    {   self.temperature = temperature;
        self
    }

    /// Reject params the service would refuse
    pub fn validate(&self) -> Result<(), crate::error::Error>
    {   if self.content.trim().is_empty()
        {   return Err(crate::error::Error::EmptyContent);
        }
        if !(1..=100).contains(&self.percent)
        {   return Err(crate::error::Error::InvalidParams(
              format!("percent {} not in 1..=100", self.percent)
            ));
        }
        if !(0.0..=1.0).contains(&self.temperature)
        {   return Err(crate::error::Error::InvalidParams(
              format!(
                "temperature {} not in 0.0..=1.0",
                self.temperature
              )
            ));
        }
        Ok(())
    }

    /// Validate and build the JSON body
    pub fn into_body(self)
      -> Result<SummarizeRequest, crate::error::Error>
    {   self.validate()?;
        Ok(SummarizeRequest
        {   content: self.content
          , percent: self.percent
          , bullets: self.bullets
          , temperature: self.temperature
        })
    }
}

/// JSON body posted to the summary endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarizeRequest
{   pub content: String
  , pub percent: u8
  , pub bullets: bool
  , pub temperature: f32
}

#[cfg(test)]
mod tests
{   use super::*;
    use crate::error::Error;

    #[test]
    fn test_defaults()
    {   let params = RequestParams::new("some text");
        assert_eq!(params.percent, 30);
        assert!(!params.bullets);
        assert_eq!(params.temperature, 0.3);
    }

    #[test]
    fn test_whitespace_content_rejected()
    {   assert_eq!(
          RequestParams::new("  \n\t ").validate(),
          Err(Error::EmptyContent)
        );
    }

    #[test]
    fn test_out_of_range_rejected()
    {   let zero = RequestParams::new("x").with_percent(0);
        assert!(matches!(
          zero.validate(),
          Err(Error::InvalidParams(_))
        ));
        let hot = RequestParams::new("x").with_temperature(1.5);
        assert!(matches!(
          hot.validate(),
          Err(Error::InvalidParams(_))
        ));
        let nan = RequestParams::new("x").with_temperature(f32::NAN);
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_body_shape()
    {   let body = RequestParams::new("Long text")
          .with_percent(50)
          .with_bullets(true)
          .with_temperature(0.5)
          .into_body()
          .unwrap();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
          json,
          serde_json::json!({
            "content": "Long text",
            "percent": 50,
            "bullets": true,
            "temperature": 0.5
          })
        );
    }
}
