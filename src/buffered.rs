use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use serde_json::Value;
use tracing::trace;

use crate::decode::DecodedBody;
use crate::limits::Limits;
use crate::{Error, Result};

type DecodeFn = fn(&[u8]) -> Result<DecodedBody>;

/// Accumulates a complete body in memory, then decodes it in one shot.
///
/// Bytes past `max_buffer_size` are discarded while counting continues,
/// so the stream drains to its natural end; the overflow is reported as
/// a single failure by [`finish`].
///
/// [`finish`]: BufferedBodyDecoder::finish
pub struct BufferedBodyDecoder {
    buffer: BytesMut,
    decode: DecodeFn,
    received: usize,
    limits: Limits,
}

impl BufferedBodyDecoder {
    /// A decoder for `application/x-www-form-urlencoded` bodies.
    #[must_use]
    pub fn urlencoded(limits: Limits) -> Self {
        Self::new(decode_urlencoded, limits)
    }

    /// A decoder for `application/json` bodies.
    #[must_use]
    pub fn json(limits: Limits) -> Self {
        Self::new(decode_json, limits)
    }

    fn new(decode: DecodeFn, limits: Limits) -> Self {
        Self {
            buffer: BytesMut::new(),
            decode,
            received: 0,
            limits,
        }
    }

    /// Feeds one body chunk.
    pub fn feed(&mut self, chunk: impl Into<Bytes>) {
        let chunk: Bytes = chunk.into();
        self.received += chunk.len();
        if self.received <= self.limits.max_buffer_size {
            self.buffer.extend_from_slice(&chunk);
        } else {
            trace!("buffered body over cap, draining {} bytes", chunk.len());
        }
    }

    /// Decodes the accumulated body, or reports the overflow.
    pub fn finish(self) -> Result<DecodedBody> {
        if let Some(max) = self.limits.checked_buffer_size(self.received) {
            return Err(Error::PayloadTooLarge(max as u64));
        }
        (self.decode)(&self.buffer)
    }
}

fn decode_urlencoded(bytes: &[u8]) -> Result<DecodedBody> {
    let fields: HashMap<String, String> = serde_urlencoded::from_bytes(bytes)
        .map_err(|_| Error::BadRequest("malformed url-encoded form"))?;
    let mut body = DecodedBody::default();
    body.fields = fields;
    Ok(body)
}

fn decode_json(bytes: &[u8]) -> Result<DecodedBody> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|_| Error::BadRequest("malformed json"))?;
    let mut body = DecodedBody::default();
    if let Value::Object(members) = &value {
        // scalar members mirror into the flat field map; composite
        // values stay only on `json`
        for (name, member) in members {
            let text = match member {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            body.fields.insert(name.clone(), text);
        }
    }
    body.json = Some(value);
    Ok(body)
}
