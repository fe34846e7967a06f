use std::collections::{hash_map::Entry, HashMap};

use http::header::{HeaderMap, CONTENT_TYPE};
use httparse::{parse_headers, Status, EMPTY_HEADER};

use crate::{Error, Result};

pub(crate) const MAX_HEADERS: usize = 8 * 2;
pub(crate) const DASHES: [u8; 2] = [b'-', b'-']; // `--`
pub(crate) const CRLF: [u8; 2] = [b'\r', b'\n']; // `\r\n`
pub(crate) const CRLFS: [u8; 4] = [b'\r', b'\n', b'\r', b'\n']; // `\r\n\r\n`

/// Parses a raw part header block, including its `\r\n\r\n` terminator,
/// into a map with lowercased names. A repeated name folds into the
/// previous value separated by `", "`.
pub(crate) fn parse_header_block(bytes: &[u8]) -> Result<HashMap<String, String>> {
    let mut headers = [EMPTY_HEADER; MAX_HEADERS];
    match parse_headers(bytes, &mut headers) {
        Ok(Status::Complete((_, parsed))) => {
            let mut map: HashMap<String, String> = HashMap::with_capacity(parsed.len());
            for header in parsed {
                let value = String::from_utf8_lossy(header.value).trim().to_owned();
                match map.entry(header.name.to_ascii_lowercase()) {
                    Entry::Occupied(mut entry) => {
                        let prev = entry.get_mut();
                        prev.push_str(", ");
                        prev.push_str(&value);
                    }
                    Entry::Vacant(entry) => {
                        entry.insert(value);
                    }
                }
            }
            Ok(map)
        }
        Ok(Status::Partial) | Err(_) => Err(Error::BadRequest("invalid part header")),
    }
}

/// Extracts the `name` and `filename` attributes of a
/// `content-disposition` value. A quoted value loses its quotes; an
/// empty `filename=""` still counts as present.
pub(crate) fn parse_content_disposition(value: &str) -> (Option<String>, Option<String>) {
    let mut name = None;
    let mut filename = None;

    for attr in value.split(';') {
        let Some((key, val)) = attr.split_once('=') else {
            continue;
        };
        let val = val.trim();
        let val = val
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(val);
        match key.trim().to_ascii_lowercase().as_str() {
            "name" => name = Some(val.to_owned()),
            "filename" => filename = Some(val.to_owned()),
            _ => {}
        }
    }

    (name, filename)
}

/// Media type of the request, lowercased and truncated at the first `;`.
pub(crate) fn media_type(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_TYPE)
        .and_then(|val| val.to_str().ok())
        .and_then(|val| val.split(';').next())
        .map(|val| val.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

/// The `boundary` parameter of a `multipart/form-data` content type.
pub(crate) fn boundary(headers: &HeaderMap) -> Result<String> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|val| val.to_str().ok())
        .and_then(|val| val.parse::<mime::Mime>().ok())
        .and_then(|m| m.get_param(mime::BOUNDARY).map(|b| b.as_str().to_owned()))
        .ok_or(Error::BadRequest("missing multipart boundary"))
}
