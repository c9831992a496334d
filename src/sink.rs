//! Subscribers for incremental summary updates

use log::debug;
use tokio::sync::mpsc;
use crate::{SummaryEvent, SummaryEventReceiver, TerminationReason};

/// Receives the growing summary of one request.
///
/// `on_update` gets the cumulative text, in chunk arrival order.
/// `on_done` is called exactly once and nothing follows it.
pub trait SummarySink: Send + 'static
{   fn on_update(&mut self, text: &str);
    fn on_done(&mut self, reason: &TerminationReason);
}

/// Sink built from a pair of closures
pub struct CallbackSink<U, D>
{   on_update: U
  , on_done: D
}

impl<U, D> CallbackSink<U, D>
where
  U: FnMut(&str) + Send + 'static
, D: FnMut(&TerminationReason) + Send + 'static
{   pub fn new(on_update: U, on_done: D) -> Self
    {   CallbackSink
        {   on_update
          , on_done
        }
    }
}

impl<U, D> SummarySink for CallbackSink<U, D>
where
  U: FnMut(&str) + Send + 'static
, D: FnMut(&TerminationReason) + Send + 'static
{   fn on_update(&mut self, text: &str)
    {   (self.on_update)(text)
    }

    fn on_done(&mut self, reason: &TerminationReason)
    {   (self.on_done)(reason)
    }
}

/// Sink forwarding every event over an unbounded channel
pub struct ChannelSink
{   tx: mpsc::UnboundedSender<SummaryEvent>
}

impl ChannelSink
{   /// Create a sink and the receiver the caller reads from.
    /// The receiver yields `None` once the request is over and
    /// the sink has been dropped.
    pub fn new() -> (Self, SummaryEventReceiver)
    {   let (tx, rx) = mpsc::unbounded_channel();
        (ChannelSink { tx }, rx)
    }
}

impl SummarySink for ChannelSink
{   fn on_update(&mut self, text: &str)
    {   if self.tx.send(SummaryEvent::Update(text.to_string())).is_err()
        {   debug!("Update receiver dropped");
        }
    }

    fn on_done(&mut self, reason: &TerminationReason)
    {   if self.tx.send(SummaryEvent::Done(reason.clone())).is_err()
        {   debug!("Done receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests
{   use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_callback_sink_forwards()
    {   let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_updates = seen.clone();
        let seen_done = seen.clone();
        let mut sink = CallbackSink::new(
          move |text: &str| {
            seen_updates.lock().unwrap().push(text.to_string())
          },
          move |reason: &TerminationReason| {
            seen_done.lock().unwrap().push(reason.to_string())
          }
        );
        sink.on_update("He");
        sink.on_done(&TerminationReason::Completed);
        assert_eq!(
          *seen.lock().unwrap(),
          vec!["He".to_string(), "completed".to_string()]
        );
    }

    #[tokio::test]
    async fn test_channel_sink_closes_on_drop()
    {   let (mut sink, mut rx) = ChannelSink::new();
        sink.on_update("A");
        sink.on_done(&TerminationReason::Cancelled);
        drop(sink);
        assert_eq!(
          rx.recv().await,
          Some(SummaryEvent::Update("A".into()))
        );
        assert_eq!(
          rx.recv().await,
          Some(SummaryEvent::Done(TerminationReason::Cancelled))
        );
        assert_eq!(rx.recv().await, None);
    }
}
