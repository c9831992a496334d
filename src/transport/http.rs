use futures_util::{FutureExt, StreamExt};
use futures_util::future::BoxFuture;
use log::{debug, trace, error};
use std::time::Duration;

use super::{ChunkStream, Transport};

/// reqwest-backed transport posting JSON to one endpoint
#[derive(Debug, Clone)]
pub struct HttpTransport
{   http_client: reqwest::Client
  , endpoint: String
  , verbose: bool
}

impl HttpTransport
{   /// Build from configuration
    pub fn new(
      config: &crate::config::SummarizerConfig
    ) -> Result<Self, crate::error::Error>
    {   config.validate()?;
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.transport.connect_timeout_secs
        {   builder = builder
              .connect_timeout(Duration::from_secs(secs));
        }
        let http_client = builder.build().map_err(|e| {
          error!("Failed to build HTTP client: {}", e);
          crate::error::Error::InvalidConfiguration(e.to_string())
        })?;
        debug!("HttpTransport for {}", config.endpoint);
        Ok(HttpTransport
        {   http_client
          , endpoint: config.endpoint.clone()
          , verbose: config.transport.verbose.unwrap_or(false)
        })
    }
}

impl Transport for HttpTransport
{   fn open(
      &self
    , body: crate::request::SummarizeRequest
    ) -> BoxFuture<'static, Result<ChunkStream, crate::error::Error>>
    {   let http_client = self.http_client.clone();
        let endpoint = self.endpoint.clone();
        let verbose = self.verbose;

        async move {
          if verbose
          {   trace!("Summary request: {:?}", body);
          }

          let response = http_client
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
              error!("HTTP error: {}", e);
              crate::error::Error::NetworkError(e.to_string())
            })?;

          let status = response.status();
          trace!("Summary response status: {}", status);

          if !status.is_success()
          {   let error_text = response.text().await
                .unwrap_or_else(|_|
                  "Unknown error".to_string()
                );
              error!("Summary endpoint error: {}", error_text);
              return Err(crate::error::Error::NetworkError(
                format!("status {}: {}", status, error_text)
              ));
          }

          let stream: ChunkStream = response
            .bytes_stream()
            .map(|chunk| {
              chunk.map_err(|e| {
                crate::error::Error::StreamError(e.to_string())
              })
            })
            .boxed();
          Ok(stream)
        }
        .boxed()
    }
}
