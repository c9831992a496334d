//! Chunk read loop: decode, accumulate, notify

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use log::{debug, trace};
use tokio_util::sync::CancellationToken;

use crate::decoder::Utf8Decoder;
use crate::sink::SummarySink;
use crate::{RequestOutcome, TerminationReason};

/// Result of waiting on the next chunk
enum Read
{   Chunk(Bytes)
  , End
  , Fault(crate::error::Error)
  , Cancelled
}

/// Turns a chunk stream into cumulative text updates.
/// One accumulator serves exactly one request.
#[derive(Debug, Default)]
pub struct StreamAccumulator
{   decoder: Utf8Decoder
  , text: String
  , chunks: usize
}

impl StreamAccumulator
{   pub fn new() -> Self
    {   StreamAccumulator::default()
    }

    /// Read `stream` until it ends, faults, or `cancel` fires.
    ///
    /// Every decoded chunk is appended and reported through
    /// `sink.on_update` before the next read starts. `sink.on_done`
    /// is called exactly once, last. The stream is dropped before
    /// this returns.
    pub async fn consume<S>(
      mut self
    , stream: S
    , cancel: &CancellationToken
    , sink: &mut dyn SummarySink
    ) -> RequestOutcome
    where
      S: Stream<Item = Result<Bytes, crate::error::Error>> + Send
    {   let reason =
        { let mut stream = std::pin::pin!(stream);
          loop
          { let read = tokio::select!
            { biased;
              _ = cancel.cancelled() => Read::Cancelled
            , next = stream.next() => match next
              {   Some(Ok(chunk)) => Read::Chunk(chunk)
                , Some(Err(e)) => Read::Fault(e)
                , None => Read::End
              }
            };

            match read
            {   Read::Chunk(chunk) => {
                  self.chunks += 1;
                  trace!(
                    "Chunk {} ({} bytes)",
                    self.chunks,
                    chunk.len()
                  );
                  let decoded = self.decoder.decode(&chunk);
                  self.append(&decoded, sink);
                }
              , Read::End => {
                  let tail = self.decoder.finish();
                  self.append(&tail, sink);
                  debug!(
                    "Stream completed after {} chunks",
                    self.chunks
                  );
                  break TerminationReason::Completed;
                }
              , Read::Fault(e) => {
                  debug!("Stream fault: {}", e);
                  break TerminationReason::StreamError(e.detail());
                }
              , Read::Cancelled => {
                  debug!(
                    "Stream cancelled after {} chunks",
                    self.chunks
                  );
                  break TerminationReason::Cancelled;
                }
            }
          }
        };

        sink.on_done(&reason);
        RequestOutcome
        {   text: self.text
          , reason
        }
    }

    fn append(&mut self, decoded: &str, sink: &mut dyn SummarySink)
    {   if decoded.is_empty()
        {   return;
        }
        self.text.push_str(decoded);
        sink.on_update(&self.text);
    }
}

#[cfg(test)]
mod tests
{   use super::*;
    use crate::sink::ChannelSink;
    use crate::SummaryEvent;
    use futures_util::stream;

    fn chunks(parts: &[&'static str])
      -> impl Stream<Item = Result<Bytes, crate::error::Error>> + Send
    {   let items: Vec<Result<Bytes, crate::error::Error>> = parts
          .iter()
          .copied()
          .map(|p| Ok(Bytes::from_static(p.as_bytes())))
          .collect();
        stream::iter(items)
    }

    async fn drain(mut rx: crate::SummaryEventReceiver)
      -> Vec<SummaryEvent>
    {   let mut events = Vec::new();
        while let Some(event) = rx.recv().await
        {   events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_updates_in_arrival_order()
    {   let (mut sink, rx) = ChannelSink::new();
        let cancel = CancellationToken::new();
        let outcome = StreamAccumulator::new()
          .consume(chunks(&["He", "llo"]), &cancel, &mut sink)
          .await;
        drop(sink);

        assert_eq!(outcome.text, "Hello");
        assert_eq!(outcome.reason, TerminationReason::Completed);
        assert_eq!(
          drain(rx).await,
          vec![
            SummaryEvent::Update("He".into()),
            SummaryEvent::Update("Hello".into()),
            SummaryEvent::Done(TerminationReason::Completed),
          ]
        );
    }

    #[tokio::test]
    async fn test_split_character_not_emitted_early()
    {   let euro = "€".as_bytes();
        let parts: Vec<Result<Bytes, crate::error::Error>> = vec![
          Ok(Bytes::from_static(b"1 ")),
          Ok(Bytes::copy_from_slice(&euro[..1])),
          Ok(Bytes::copy_from_slice(&euro[1..])),
        ];
        let (mut sink, rx) = ChannelSink::new();
        let cancel = CancellationToken::new();
        let outcome = StreamAccumulator::new()
          .consume(stream::iter(parts), &cancel, &mut sink)
          .await;
        drop(sink);

        assert_eq!(outcome.text, "1 €");
        assert_eq!(
          drain(rx).await,
          vec![
            SummaryEvent::Update("1 ".into()),
            SummaryEvent::Update("1 €".into()),
            SummaryEvent::Done(TerminationReason::Completed),
          ]
        );
    }

    #[tokio::test]
    async fn test_fault_ends_stream()
    {   let parts: Vec<Result<Bytes, crate::error::Error>> = vec![
          Ok(Bytes::from_static(b"partial")),
          Err(crate::error::Error::StreamError(
            "connection reset".into()
          )),
          Ok(Bytes::from_static(b"never")),
        ];
        let (mut sink, rx) = ChannelSink::new();
        let cancel = CancellationToken::new();
        let outcome = StreamAccumulator::new()
          .consume(stream::iter(parts), &cancel, &mut sink)
          .await;
        drop(sink);

        assert_eq!(outcome.text, "partial");
        assert_eq!(
          outcome.reason,
          TerminationReason::StreamError("connection reset".into())
        );
        let events = drain(rx).await;
        assert_eq!(events.len(), 2);
        assert_eq!(
          events[1],
          SummaryEvent::Done(outcome.reason.clone())
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_first_read()
    {   let (mut sink, rx) = ChannelSink::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = StreamAccumulator::new()
          .consume(chunks(&["ignored"]), &cancel, &mut sink)
          .await;
        drop(sink);

        assert_eq!(outcome.text, "");
        assert_eq!(outcome.reason, TerminationReason::Cancelled);
        assert_eq!(
          drain(rx).await,
          vec![SummaryEvent::Done(TerminationReason::Cancelled)]
        );
    }

    #[tokio::test]
    async fn test_cancel_unblocks_pending_read()
    {   let (mut sink, rx) = ChannelSink::new();
        let cancel = CancellationToken::new();
        let pending = stream::iter(vec![
          Ok::<_, crate::error::Error>(Bytes::from_static(b"A"))
        ])
          .chain(stream::pending());

        let trigger = cancel.clone();
        tokio::spawn(async move {
          tokio::time::sleep(std::time::Duration::from_millis(20))
            .await;
          trigger.cancel();
        });

        let outcome = StreamAccumulator::new()
          .consume(pending, &cancel, &mut sink)
          .await;
        drop(sink);

        assert_eq!(outcome.text, "A");
        assert_eq!(outcome.reason, TerminationReason::Cancelled);
        assert_eq!(
          drain(rx).await.last(),
          Some(&SummaryEvent::Done(TerminationReason::Cancelled))
        );
    }
}
