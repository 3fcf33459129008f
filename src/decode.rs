//! Response content helpers. None of these are retried.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;
use url::Url;

use crate::{Content, RequestsError, Response, Result};

/// Parses response content as JSON.
pub fn parse_content_json<D: DeserializeOwned>(response: &Response) -> Result<D> {
    match &response.content {
        Some(Content::Bytes(bytes)) => serde_json::from_slice(bytes).map_err(RequestsError::Json),
        Some(Content::Text(text)) => serde_json::from_str(text).map_err(RequestsError::Json),
        None => Err(RequestsError::Decode(
            "response has no content to parse as JSON".to_owned(),
        )),
    }
}

/// Decodes response content as text.
///
/// Returns `Ok(None)` when the response carries no content and text content
/// as is. Byte content is decoded strictly with `encoding`, any WHATWG label
/// (`utf-8`, `gbk`, `gb18030`, `big5`, `shift_jis`, ...) plus `ascii` and
/// `latin-1`. `utf-16` honours a leading byte order mark.
pub fn parse_content_text(response: &Response, encoding: &str) -> Result<Option<String>> {
    match &response.content {
        Some(Content::Text(text)) => Ok(Some(text.clone())),
        Some(Content::Bytes(bytes)) => decode_bytes(bytes, encoding).map(Some),
        None => Ok(None),
    }
}

/// Guesses a file name from the last segment of a URL path.
///
/// `"https://example.com/path/to/file.png?x=1"` gives `"file.png"`,
/// `"https://example.com/"` gives `""`. Percent escapes are decoded.
pub fn filename_from_url(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_owned(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_owned(),
    };

    let segment = path
        .rsplit('/')
        .find(|segment| !segment.is_empty() && *segment != ".")
        .unwrap_or_default();
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}

fn decode_bytes(bytes: &[u8], encoding: &str) -> Result<String> {
    let label = encoding.trim().to_ascii_lowercase().replace('_', "-");
    match label.as_str() {
        "ascii" | "us-ascii" => match bytes.iter().position(|byte| !byte.is_ascii()) {
            Some(index) => Err(RequestsError::Decode(format!(
                "non-ascii byte 0x{:02x} at position {index}",
                bytes[index]
            ))),
            None => Ok(bytes.iter().map(|&byte| char::from(byte)).collect()),
        },
        // WHATWG maps these labels to windows-1252, which differs in 0x80..=0x9f.
        "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" => {
            Ok(bytes.iter().map(|&byte| char::from(byte)).collect())
        }
        "utf-16" | "utf16" => match Encoding::for_bom(bytes) {
            Some((codec, bom)) if codec != UTF_8 => decode_strict(codec, &bytes[bom..]),
            _ => decode_strict(UTF_16LE, bytes),
        },
        "utf8" => decode_strict(UTF_8, bytes),
        "utf16le" => decode_strict(UTF_16LE, bytes),
        "utf16be" => decode_strict(UTF_16BE, bytes),
        _ => match Encoding::for_label(label.as_bytes()) {
            Some(codec) => decode_strict(codec, bytes),
            None => Err(RequestsError::Decode(format!(
                "unsupported encoding '{encoding}'"
            ))),
        },
    }
}

fn decode_strict(codec: &'static Encoding, bytes: &[u8]) -> Result<String> {
    codec
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(Cow::into_owned)
        .ok_or_else(|| RequestsError::Decode(format!("content is not valid {}", codec.name())))
}
