pub mod error;
pub mod config;
pub mod request;
pub mod decoder;
pub mod sink;
pub mod accumulator;
pub mod transport;
pub mod controller;

pub use error::Error;
pub use config::{SummarizerConfig, TransportConfig};
pub use request::{RequestParams, SummarizeRequest};
pub use sink::{CallbackSink, ChannelSink, SummarySink};
pub use accumulator::StreamAccumulator;
pub use transport::{HttpTransport, Transport};
pub use controller::{RequestController, RequestHandle};

/*

sumstream: submit text to a streaming summarization service and watch
the summary grow chunk by chunk, with cancellation at any point.

sumstream/
├── Cargo.toml
├── src/
│   ├── lib.rs          # Shared result types, re-exports
│   ├── error.rs        # Error type
│   ├── config.rs       # Endpoint and transport configuration
│   ├── request.rs      # Request params and JSON body
│   ├── decoder.rs      # Incremental UTF-8 decoding
│   ├── sink.rs         # Update subscribers
│   ├── accumulator.rs  # Chunk read loop
│   ├── transport/      # Outbound connection (reqwest)
│   ├── controller.rs   # Single-active-request actor
│   └── bin/sumstream.rs
└── tests/

*/

/// SUMSTREAM RESULT TYPES:

/// Why a request ended. Exactly one per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason
{   /// Stream reached end-of-data
    Completed
  , /// Caller cancelled; not a failure
    Cancelled
  , /// Connection could not be established
    NetworkError(String)
  , /// Fault while reading chunks
    StreamError(String)
}

impl TerminationReason
{   /// True for the reasons a user should see as failures
    pub fn is_failure(&self) -> bool
    {   matches!(
          self,
          TerminationReason::NetworkError(_)
            | TerminationReason::StreamError(_)
        )
    }
}

impl std::fmt::Display for TerminationReason
{   fn fmt(&self, f: &mut std::fmt::Formatter<'_>)
      -> std::fmt::Result
    {   match self
        {   TerminationReason::Completed => write!(f, "completed")
          , TerminationReason::Cancelled => write!(f, "cancelled")
          , TerminationReason::NetworkError(detail) => {
              write!(f, "network error: {}", detail)
            }
          , TerminationReason::StreamError(detail) => {
              write!(f, "stream error: {}", detail)
            }
        }
    }
}

/// Final state of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOutcome
{   /// Everything decoded before termination
    pub text: String
  , pub reason: TerminationReason
}

/// Events emitted by a ChannelSink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryEvent
{   /// Cumulative text so far
    Update(String)
  , /// Terminal, sent once
    Done(TerminationReason)
}

pub type SummaryEventSender
  = tokio::sync::mpsc::UnboundedSender<SummaryEvent>;
pub type SummaryEventReceiver
  = tokio::sync::mpsc::UnboundedReceiver<SummaryEvent>;
