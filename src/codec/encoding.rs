//! Body encodings carried by `httpBodyEncodeType`.
//!
//! The set is closed: a tag that does not name one of the variants below is
//! rejected instead of being handed to a generic decoder.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use thiserror::Error;

/// Wire tag for percent-encoded text.
pub const URI_COMPONENT_TAG: &str = "URIComponent";

/// Errors produced while translating between body text and bytes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("unsupported body encoding '{0}'")]
    Unsupported(String),

    #[error("body is not valid {encoding}: {reason}")]
    InvalidBody {
        encoding: &'static str,
        reason: String,
    },

    #[error("bytes cannot be represented as {0}")]
    Unrepresentable(&'static str),
}

/// A supported body encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyEncoding {
    /// Percent-encoded UTF-8 text, as produced by `encodeURIComponent`.
    UriComponent,
    Base64,
    /// URL-safe alphabet, no padding.
    Base64Url,
    Hex,
    Utf8,
    /// One byte per code point, code points above U+00FF rejected.
    Latin1,
    Ascii,
    Utf16Le,
}

impl BodyEncoding {
    /// Resolve a wire tag.
    ///
    /// `URIComponent` must match exactly; scheme names are case-insensitive
    /// and accept the usual aliases (`utf-8`, `binary`, `ucs2`, ...).
    pub fn from_tag(tag: &str) -> Result<Self, EncodingError> {
        if tag == URI_COMPONENT_TAG {
            return Ok(Self::UriComponent);
        }
        match tag.to_ascii_lowercase().as_str() {
            "base64" => Ok(Self::Base64),
            "base64url" => Ok(Self::Base64Url),
            "hex" => Ok(Self::Hex),
            "utf8" | "utf-8" => Ok(Self::Utf8),
            "latin1" | "binary" => Ok(Self::Latin1),
            "ascii" => Ok(Self::Ascii),
            "utf16le" | "utf-16le" | "ucs2" | "ucs-2" => Ok(Self::Utf16Le),
            _ => Err(EncodingError::Unsupported(tag.to_string())),
        }
    }

    /// Canonical wire tag.
    pub fn tag(self) -> &'static str {
        match self {
            Self::UriComponent => URI_COMPONENT_TAG,
            Self::Base64 => "base64",
            Self::Base64Url => "base64url",
            Self::Hex => "hex",
            Self::Utf8 => "utf8",
            Self::Latin1 => "latin1",
            Self::Ascii => "ascii",
            Self::Utf16Le => "utf16le",
        }
    }

    /// Turn body text into the bytes it denotes.
    pub fn decode(self, text: &str) -> Result<Vec<u8>, EncodingError> {
        match self {
            Self::UriComponent => percent_decode(text),
            Self::Base64 => STANDARD.decode(text).map_err(|e| self.invalid(e)),
            Self::Base64Url => URL_SAFE_NO_PAD
                .decode(text.trim_end_matches('='))
                .map_err(|e| self.invalid(e)),
            Self::Hex => hex::decode(text).map_err(|e| self.invalid(e)),
            Self::Utf8 => Ok(text.as_bytes().to_vec()),
            Self::Latin1 => text
                .chars()
                .map(|c| u8::try_from(c).map_err(|_| self.invalid(format!("code point {:?} above U+00FF", c))))
                .collect(),
            Self::Ascii => {
                if let Some(c) = text.chars().find(|c| !c.is_ascii()) {
                    return Err(self.invalid(format!("non-ASCII character {:?}", c)));
                }
                Ok(text.as_bytes().to_vec())
            }
            Self::Utf16Le => Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
        }
    }

    /// Turn bytes into body text under this encoding.
    ///
    /// Text-like encodings fail for bytes they cannot represent.
    pub fn encode(self, bytes: &[u8]) -> Result<String, EncodingError> {
        match self {
            Self::UriComponent => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|_| EncodingError::Unrepresentable(self.tag()))?;
                Ok(urlencoding::encode(text).into_owned())
            }
            Self::Base64 => Ok(STANDARD.encode(bytes)),
            Self::Base64Url => Ok(URL_SAFE_NO_PAD.encode(bytes)),
            Self::Hex => Ok(hex::encode(bytes)),
            Self::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|_| EncodingError::Unrepresentable(self.tag())),
            Self::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            Self::Ascii => {
                if !bytes.is_ascii() {
                    return Err(EncodingError::Unrepresentable(self.tag()));
                }
                Ok(bytes.iter().map(|&b| char::from(b)).collect())
            }
            Self::Utf16Le => {
                if bytes.len() % 2 != 0 {
                    return Err(EncodingError::Unrepresentable(self.tag()));
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16(&units).map_err(|_| EncodingError::Unrepresentable(self.tag()))
            }
        }
    }

    fn invalid(self, reason: impl fmt::Display) -> EncodingError {
        EncodingError::InvalidBody {
            encoding: self.tag(),
            reason: reason.to_string(),
        }
    }
}

impl FromStr for BodyEncoding {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s)
    }
}

impl fmt::Display for BodyEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Strict percent-decoding: every `%` must start a two-digit hex escape and
/// the result must be UTF-8.
fn percent_decode(text: &str) -> Result<Vec<u8>, EncodingError> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while let Some(offset) = bytes[i..].iter().position(|&b| b == b'%') {
        let at = i + offset;
        let escape_ok = bytes
            .get(at + 1..at + 3)
            .is_some_and(|digits| digits.iter().all(u8::is_ascii_hexdigit));
        if !escape_ok {
            return Err(BodyEncoding::UriComponent.invalid(format!("malformed escape at byte {}", at)));
        }
        i = at + 3;
    }

    urlencoding::decode(text)
        .map(|decoded| decoded.into_owned().into_bytes())
        .map_err(|e| BodyEncoding::UriComponent.invalid(e))
}
