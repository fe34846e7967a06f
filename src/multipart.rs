use std::collections::HashMap;

use bytes::{Buf, Bytes, BytesMut};
use memchr::memmem;
use tracing::trace;

use crate::decode::{DecodedBody, Subscriber};
use crate::headers::{parse_header_block, CRLF, CRLFS, DASHES};
use crate::limits::Limits;
use crate::part::Part;
use crate::{Error, Result};

/// Incremental `multipart/form-data` decoder.
///
/// Raw body chunks are pushed with [`feed`]; the boundary markers may
/// be split at any byte position across chunks. The buffer stays raw
/// bytes while boundary matching is in progress and binary payloads
/// round-trip exactly; text decoding happens only when a complete
/// field is finalized.
///
/// [`feed`]: MultipartDecoder::feed
pub struct MultipartDecoder {
    buffer: BytesMut,
    /// `--boundary`, the marker opening the first part.
    opening: Bytes,
    /// `\r\n--boundary`, the marker separating and terminating parts.
    delimiter: Bytes,
    current: Option<Part>,
    body: DecodedBody,
    limits: Limits,
    received: u64,
    error: Option<Error>,
}

impl MultipartDecoder {
    /// Creates a decoder for the given boundary.
    pub fn new(boundary: impl AsRef<[u8]>, limits: Limits) -> Self {
        let boundary = boundary.as_ref();

        // `\r\n--boundary`
        let mut delimiter = BytesMut::with_capacity(4 + boundary.len());
        delimiter.extend_from_slice(&CRLF);
        delimiter.extend_from_slice(&DASHES);
        delimiter.extend_from_slice(boundary);
        let delimiter = delimiter.freeze();
        let opening = delimiter.slice(CRLF.len()..);

        Self {
            buffer: BytesMut::new(),
            opening,
            delimiter,
            current: None,
            body: DecodedBody::default(),
            limits,
            received: 0,
            error: None,
        }
    }

    /// Feeds one body chunk. Failures are sticky: the first error stops
    /// part processing, later chunks are drained uninspected, and the
    /// error is reported once by [`finish`].
    ///
    /// [`finish`]: MultipartDecoder::finish
    pub fn feed(&mut self, chunk: impl Into<Bytes>, subscriber: &mut dyn Subscriber) {
        let chunk: Bytes = chunk.into();
        self.received += chunk.len() as u64;
        if self.error.is_some() {
            return;
        }
        if let Some(max) = self.limits.checked_request_size(self.received) {
            self.error = Some(Error::PayloadTooLarge(max));
            return;
        }

        self.buffer.extend_from_slice(&chunk);
        if let Err(e) = self.run(subscriber) {
            self.error = Some(e);
        }
    }

    /// Reports the terminal outcome: the sticky error if one was set, a
    /// `BadRequest` if the stream ended inside an unterminated part,
    /// otherwise the decoded body.
    pub fn finish(mut self) -> Result<DecodedBody> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        if self.current.is_some() {
            return Err(Error::BadRequest("unterminated multipart body"));
        }
        Ok(self.body)
    }

    /// Consumes as much of the buffer as possible. A single chunk may
    /// carry several complete parts back-to-back.
    fn run(&mut self, subscriber: &mut dyn Subscriber) -> Result<()> {
        loop {
            let Some(part) = self.current.as_mut() else {
                // header scan: the buffer starts at `--boundary\r\n`,
                // the part's header block ends at `\r\n\r\n`
                let Some(n) = memmem::find(&self.buffer, &CRLFS) else {
                    if let Some(max) = self.limits.checked_header_size(self.buffer.len()) {
                        return Err(Error::HeaderTooLarge(max));
                    }
                    // header block incomplete, await more input
                    return Ok(());
                };

                let skip = self.opening.len() + CRLF.len();
                let headers = if n + CRLFS.len() > skip {
                    parse_header_block(&self.buffer[skip..n + CRLFS.len()])?
                } else {
                    // degenerate headerless part
                    HashMap::new()
                };

                let mut part = Part::from_headers(headers);
                trace!("part `{}` started", part.name());
                subscriber.part_started(&mut part)?;
                self.current = Some(part);
                self.buffer.advance(n + CRLFS.len());
                continue;
            };

            // body scan
            match memmem::find(&self.buffer, &self.delimiter) {
                Some(n) => {
                    // everything before the delimiter closes this part
                    let tail = self.buffer.split_to(n).freeze();
                    // keep `--boundary` at the head for the next header scan
                    self.buffer.advance(CRLF.len());
                    if !tail.is_empty() {
                        part.write(tail)?;
                    }
                    part.end()?;
                    if let Some(part) = self.current.take() {
                        self.body.route(part, subscriber);
                    }
                }
                None => {
                    // the delimiter may straddle this chunk and the
                    // next: hold back a delimiter-sized suffix
                    if self.buffer.len() > self.delimiter.len() {
                        let safe = self.buffer.len() - self.delimiter.len();
                        part.write(self.buffer.split_to(safe).freeze())?;
                    }
                    return Ok(());
                }
            }
        }
    }
}
