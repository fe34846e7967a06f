use std::collections::HashMap;
use std::error::Error as StdError;

use bytes::Bytes;
use futures_util::stream::{Stream, StreamExt};
use http::header::{HeaderMap, CONTENT_LENGTH};
use serde::Serialize;
use tracing::debug;

use crate::binary::BinaryStreamDecoder;
use crate::buffered::BufferedBodyDecoder;
use crate::headers::{boundary, media_type};
use crate::limits::Limits;
use crate::multipart::MultipartDecoder;
use crate::part::{FileDescriptor, Part};
use crate::{Error, Result};

/// The normalized result of a decoded request body.
#[derive(Debug, Default, Serialize)]
pub struct DecodedBody {
    /// Named text fields; a repeated name overwrites the earlier value.
    pub fields: HashMap<String, String>,
    /// Named file uploads; a repeated name overwrites the earlier file.
    pub files: HashMap<String, FileDescriptor>,
    /// The decoded JSON value itself, for `application/json` bodies.
    pub json: Option<serde_json::Value>,
}

impl DecodedBody {
    /// Routes one finalized part into the result and signals it.
    pub(crate) fn route(&mut self, mut part: Part, subscriber: &mut dyn Subscriber) {
        if part.is_file() {
            let file = part.descriptor();
            subscriber.part_ended(part.name(), &file);
            self.files.insert(part.name().to_owned(), file);
        } else {
            let value = part.take_text();
            subscriber.field_decoded(part.name(), &value);
            self.fields.insert(part.name().to_owned(), value);
        }
    }
}

/// Observer of per-part lifecycle signals.
///
/// Within one part the order is `part_started`, content arrival, then
/// `field_decoded` or `part_ended`; a part is fully routed into the
/// result before the next part starts, preserving wire order. The
/// terminal completed/failed outcome is the return value of
/// [`BodyDecoder::finish`], delivered exactly once.
///
/// `()` is the no-op subscriber.
pub trait Subscriber {
    /// A new part's headers are known. File parts may be told to
    /// persist themselves here via [`Part::save_to`].
    fn part_started(&mut self, part: &mut Part) -> Result<()> {
        let _ = part;
        Ok(())
    }

    /// A text field completed with the given value.
    fn field_decoded(&mut self, name: &str, value: &str) {
        let _ = (name, value);
    }

    /// A file part completed.
    fn part_ended(&mut self, name: &str, file: &FileDescriptor) {
        let _ = (name, file);
    }
}

impl Subscriber for () {}

enum Inner {
    Buffered(BufferedBodyDecoder),
    Multipart(MultipartDecoder),
    Binary(BinaryStreamDecoder),
    // dispatch failed; construction never fails, finish reports it
    Rejected(Error),
}

/// Decodes an HTTP request body into a [`DecodedBody`].
///
/// Dispatches on the `content-type` header: url-encoded forms and JSON
/// are buffered whole then decoded, `multipart/form-data` and
/// `application/octet-stream` are streamed chunk by chunk.
pub struct BodyDecoder {
    inner: Inner,
    declared_length: Option<u64>,
}

impl BodyDecoder {
    /// Picks a decoder for the request described by `headers`.
    #[must_use]
    pub fn new(headers: &HeaderMap, limits: Limits) -> Self {
        let media = media_type(headers);
        debug!("dispatching body decode for `{}`", media);

        let inner = match media.as_str() {
            "application/x-www-form-urlencoded" => {
                Inner::Buffered(BufferedBodyDecoder::urlencoded(limits))
            }
            "application/json" => Inner::Buffered(BufferedBodyDecoder::json(limits)),
            "multipart/form-data" => match boundary(headers) {
                Ok(b) => Inner::Multipart(MultipartDecoder::new(b, limits)),
                Err(e) => Inner::Rejected(e),
            },
            "application/octet-stream" => Inner::Binary(BinaryStreamDecoder::new(headers, limits)),
            _ => Inner::Rejected(Error::UnsupportedMediaType(media.clone())),
        };

        let declared_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse().ok());

        Self {
            inner,
            declared_length,
        }
    }

    /// The declared `content-length`, informational only; size caps are
    /// enforced against the bytes actually received.
    #[must_use]
    pub fn declared_length(&self) -> Option<u64> {
        self.declared_length
    }

    /// Feeds one body chunk. Failures are sticky and reported once by
    /// [`finish`]; the input stream should still be drained to its
    /// natural end.
    ///
    /// [`finish`]: BodyDecoder::finish
    pub fn feed(&mut self, chunk: impl Into<Bytes>, subscriber: &mut dyn Subscriber) {
        match &mut self.inner {
            Inner::Buffered(decoder) => decoder.feed(chunk),
            Inner::Multipart(decoder) => decoder.feed(chunk, subscriber),
            Inner::Binary(decoder) => decoder.feed(chunk, subscriber),
            Inner::Rejected(_) => {}
        }
    }

    /// Reports the terminal outcome, exactly once: the decoded body, or
    /// the single failure covering this request.
    pub fn finish(self, subscriber: &mut dyn Subscriber) -> Result<DecodedBody> {
        match self.inner {
            Inner::Buffered(decoder) => decoder.finish(),
            Inner::Multipart(decoder) => decoder.finish(),
            Inner::Binary(decoder) => decoder.finish(subscriber),
            Inner::Rejected(e) => Err(e),
        }
    }

    /// Drives a whole chunk stream through a decoder built for
    /// `headers` and reports the terminal outcome.
    pub async fn decode<S, B, E>(
        headers: &HeaderMap,
        body: S,
        limits: Limits,
        subscriber: &mut dyn Subscriber,
    ) -> Result<DecodedBody>
    where
        S: Stream<Item = std::result::Result<B, E>> + Unpin,
        B: Into<Bytes>,
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        let mut decoder = BodyDecoder::new(headers, limits);
        let mut body = body;
        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(data) => decoder.feed(data, subscriber),
                Err(e) => return Err(Error::BoxError(e.into())),
            }
        }
        decoder.finish(subscriber)
    }
}
