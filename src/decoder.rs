//! Incremental UTF-8 decoding across chunk boundaries

use encoding_rs::{CoderResult, Decoder, UTF_8};
use log::trace;

/// Stateful decoder that keeps the tail of a split multi-byte
/// character until the next chunk completes it.
/// Invalid sequences decode to U+FFFD.
pub struct Utf8Decoder
{   inner: Decoder
}

impl Default for Utf8Decoder
{   fn default() -> Self
    {   // a leading BOM is summary text like any other
        Utf8Decoder { inner: UTF_8.new_decoder_without_bom_handling() }
    }
}

impl std::fmt::Debug for Utf8Decoder
{   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {   f.debug_struct("Utf8Decoder")
          .field("encoding", &self.inner.encoding().name())
          .finish()
    }
}

impl Utf8Decoder
{   pub fn new() -> Self
    {   Utf8Decoder::default()
    }

    /// Decode the next chunk, carrying any incomplete tail
    pub fn decode(&mut self, chunk: &[u8]) -> String
    {   self.run(chunk, false)
    }

    /// End of input: a dangling partial character becomes U+FFFD.
    /// The decoder is reset and can be reused afterwards.
    pub fn finish(&mut self) -> String
    {   let out = self.run(&[], true);
        self.inner = UTF_8.new_decoder_without_bom_handling();
        out
    }

    fn run(&mut self, mut src: &[u8], last: bool) -> String
    {   let mut out = String::new();
        loop
        {   let room = self.inner
              .max_utf8_buffer_length(src.len())
              .unwrap_or(src.len().max(4096));
            out.reserve(room);
            let (result, read, replaced)
              = self.inner.decode_to_string(src, &mut out, last);
            if replaced
            {   trace!("Replaced malformed UTF-8 in {} bytes", read);
            }
            src = &src[read..];
            match result
            {   CoderResult::InputEmpty => break
              , CoderResult::OutputFull => continue
            }
        }
        out
    }
}
