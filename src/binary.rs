use std::collections::HashMap;

use bytes::Bytes;
use http::HeaderMap;
use tracing::trace;

use crate::decode::{DecodedBody, Subscriber};
use crate::limits::Limits;
use crate::part::Part;
use crate::{Error, Result};

/// Decodes a raw `application/octet-stream` body as a single file part.
///
/// The part's identity comes from the `x-file-name`, `x-mime-type` and
/// `x-field-name` side-channel headers instead of multipart framing;
/// content streams through the part without whole-body buffering.
pub struct BinaryStreamDecoder {
    part: Option<Part>,
    started: bool,
    body: DecodedBody,
    limits: Limits,
    received: u64,
    error: Option<Error>,
}

impl BinaryStreamDecoder {
    /// Creates a decoder for the request described by `headers`.
    #[must_use]
    pub fn new(headers: &HeaderMap, limits: Limits) -> Self {
        let mut part_headers = HashMap::new();
        part_headers.insert("x-file-name".to_owned(), header_str(headers, "x-file-name"));
        part_headers.insert("content-type".to_owned(), header_str(headers, "x-mime-type"));
        if headers.contains_key("x-field-name") {
            part_headers.insert("x-field-name".to_owned(), header_str(headers, "x-field-name"));
        }

        Self {
            part: Some(Part::from_headers(part_headers)),
            started: false,
            body: DecodedBody::default(),
            limits,
            received: 0,
            error: None,
        }
    }

    /// Feeds one body chunk. After a failure the remaining input is
    /// drained uninspected; the error is reported once by [`finish`].
    ///
    /// [`finish`]: BinaryStreamDecoder::finish
    pub fn feed(&mut self, chunk: impl Into<Bytes>, subscriber: &mut dyn Subscriber) {
        let chunk: Bytes = chunk.into();
        self.received += chunk.len() as u64;
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.advance(chunk, subscriber) {
            self.error = Some(e);
        }
    }

    fn advance(&mut self, chunk: Bytes, subscriber: &mut dyn Subscriber) -> Result<()> {
        let Some(part) = self.part.as_mut() else {
            return Ok(());
        };
        if !self.started {
            self.started = true;
            trace!("binary upload `{}` started", part.filename().unwrap_or(""));
            subscriber.part_started(part)?;
        }
        if let Some(max) = self.limits.checked_request_size(self.received) {
            return Err(Error::PayloadTooLarge(max));
        }
        part.write(chunk)
    }

    /// Reports the terminal outcome: the sticky error, or the decoded
    /// body holding the single finalized file.
    pub fn finish(mut self, subscriber: &mut dyn Subscriber) -> Result<DecodedBody> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        if let Some(mut part) = self.part.take() {
            part.end()?;
            self.body.route(part, subscriber);
        }
        Ok(self.body)
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|val| val.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}
