//! Decodes HTTP request bodies into named text fields and named file
//! uploads, so a request handler never deals with wire-level framing.
//!
//! Four content-type families are recognized: url-encoded forms and
//! JSON (buffered whole, then decoded), raw
//! `application/octet-stream` uploads and `multipart/form-data` (both
//! streamed). The multipart path parses an unbounded chunk stream whose
//! boundary markers may be split at any byte position, hashes file
//! content incrementally and can stream files to disk with
//! collision-safe naming.
//!
//! # Example
//!
//! ```rust
//! use bytes::Bytes;
//! use futures_util::stream;
//! use http::HeaderMap;
//!
//! use body_data::{BodyDecoder, DecodedBody, Error, Limits, Part, Subscriber};
//!
//! // persist every uploaded file under `uploads/`
//! struct SaveUploads;
//!
//! impl Subscriber for SaveUploads {
//!     fn part_started(&mut self, part: &mut Part) -> Result<(), Error> {
//!         part.save_to("uploads")
//!     }
//! }
//!
//! async fn handle(headers: HeaderMap) -> Result<DecodedBody, Error> {
//!     let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
//!         Ok(Bytes::from_static(b"a=1&b=hello")),
//!     ];
//!     let body = stream::iter(chunks);
//!
//!     let parsed = BodyDecoder::decode(&headers, body, Limits::default(), &mut SaveUploads).await?;
//!
//!     for (name, value) in &parsed.fields {
//!         tracing::info!("field {} = {}", name, value);
//!     }
//!     for (name, file) in &parsed.files {
//!         tracing::info!("file {} {:?} {}", name, file.saved_path, file.content_hash);
//!     }
//!
//!     Ok(parsed)
//! }
//! ```
//!
//! Failures map onto HTTP status codes via [`Error::status`]: 400 for
//! malformed payloads, 413 for exceeded size caps, 415 for an
//! unrecognized content type and 431 for an oversized part header
//! block.

#![forbid(unsafe_code)]
#![deny(nonstandard_style)]
#![warn(missing_docs, unreachable_pub)]

mod binary;
mod buffered;
mod decode;
mod error;
mod headers;
mod limits;
mod multipart;
mod part;
mod save;

pub use binary::BinaryStreamDecoder;

pub use buffered::BufferedBodyDecoder;

pub use decode::{BodyDecoder, DecodedBody, Subscriber};

pub use error::Error;

pub use limits::Limits;

pub use multipart::MultipartDecoder;

pub use part::{FileDescriptor, Part, PartKind};

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;
