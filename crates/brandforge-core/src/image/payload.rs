//! Image payload decoding
//!
//! Providers hand back image content in several shapes: raw bytes, base64 text
//! (sometimes already a data URI, sometimes base64 of base64), or a structured
//! object with a declared MIME type. [`decode`] detects which shape it has and
//! produces exactly one canonical encoding. Decoding a canonical URI yields the
//! same string.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Supported image formats, identified by magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    WebP,
    Gif,
}

impl ImageFormat {
    /// Detect the format from the leading bytes
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(Self::Png)
        } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if data.starts_with(b"RIFF") && data.get(8..12) == Some(b"WEBP") {
            Some(Self::WebP)
        } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else {
            None
        }
    }

    /// Parse a MIME type such as `image/png`
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            "image/gif" => Some(Self::Gif),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
            Self::Gif => "image/gif",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
            Self::Gif => "gif",
        }
    }
}

/// Inner data of a structured payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadData {
    Bytes(Vec<u8>),
    Base64(String),
}

/// Image content as returned by a provider, before canonicalisation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    /// Raw binary image content
    Bytes(Vec<u8>),
    /// Base64 text, possibly a full data URI
    Base64(String),
    /// Object carrying its own MIME declaration
    Structured {
        mime_type: Option<String>,
        data: PayloadData,
    },
}

/// Canonical `data:<mime>;base64,<standard padded base64>` string
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageDataUri {
    format: ImageFormat,
    uri: String,
}

impl ImageDataUri {
    /// Encode image bytes whose format is already known
    pub fn encode(format: ImageFormat, bytes: &[u8]) -> Self {
        Self {
            format,
            uri: format!("data:{};base64,{}", format.mime_type(), STANDARD.encode(bytes)),
        }
    }

    /// Encode raw image bytes, sniffing the format
    pub fn from_image_bytes(bytes: &[u8]) -> Result<Self> {
        let format = ImageFormat::sniff(bytes)
            .ok_or_else(|| Error::Decode("bytes are not a recognised image format".to_string()))?;
        Ok(Self::encode(format, bytes))
    }

    /// Parse any data URI or base64 text into canonical form
    pub fn parse(text: &str) -> Result<Self> {
        decode_text(text, None)
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn as_str(&self) -> &str {
        &self.uri
    }

    /// The base64 body after the comma
    pub fn base64_data(&self) -> &str {
        self.uri.split_once(',').map(|(_, body)| body).unwrap_or_default()
    }

    /// Decoded image bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.base64_data())
            .map_err(|e| Error::Decode(format!("invalid base64 body: {}", e)))
    }
}

impl fmt::Debug for ImageDataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageDataUri")
            .field("format", &self.format)
            .field("len", &self.uri.len())
            .finish()
    }
}

impl fmt::Display for ImageDataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

impl TryFrom<String> for ImageDataUri {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ImageDataUri> for String {
    fn from(value: ImageDataUri) -> Self {
        value.uri
    }
}

/// Decode any provider payload into a canonical data URI
pub fn decode(payload: &ImagePayload) -> Result<ImageDataUri> {
    match payload {
        ImagePayload::Bytes(bytes) => resolve_bytes(bytes, None),
        ImagePayload::Base64(text) => decode_text(text, None),
        ImagePayload::Structured { mime_type, data } => {
            let declared = mime_type.as_deref();
            match data {
                PayloadData::Bytes(bytes) => resolve_bytes(bytes, declared),
                PayloadData::Base64(text) => decode_text(text, declared),
            }
        }
    }
}

fn decode_text(text: &str, declared: Option<&str>) -> Result<ImageDataUri> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Error::Decode("empty payload".to_string()));
    }

    if let Some((header_mime, body)) = split_data_uri(trimmed)? {
        let bytes = decode_base64(body)
            .ok_or_else(|| Error::Decode("data URI body is not valid base64".to_string()))?;
        return resolve_bytes(&bytes, Some(header_mime).or(declared));
    }

    let bytes = decode_base64(trimmed)
        .ok_or_else(|| Error::Decode("payload text is not valid base64".to_string()))?;
    resolve_bytes(&bytes, declared)
}

/// Split `data:<mime>;base64,<body>`; `Ok(None)` when the text is not a data URI
fn split_data_uri(text: &str) -> Result<Option<(&str, &str)>> {
    let Some(rest) = text.strip_prefix("data:") else {
        return Ok(None);
    };
    let (header, body) = rest
        .split_once(',')
        .ok_or_else(|| Error::Decode("data URI has no ',' separator".to_string()))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| Error::Decode("only base64 data URIs are supported".to_string()))?;
    Ok(Some((mime, body)))
}

fn resolve_bytes(bytes: &[u8], declared: Option<&str>) -> Result<ImageDataUri> {
    if bytes.is_empty() {
        return Err(Error::Decode("empty image content".to_string()));
    }

    if let Some(format) = ImageFormat::sniff(bytes) {
        note_declared_mismatch(declared, format);
        return Ok(ImageDataUri::encode(format, bytes));
    }

    // Base64 text of an image that was encoded a second time; unwrap once only.
    if let Some(inner) = unwrap_text_layer(bytes) {
        if let Some(format) = ImageFormat::sniff(&inner) {
            debug!(format = ?format, "Unwrapped double-encoded image payload");
            note_declared_mismatch(declared, format);
            return Ok(ImageDataUri::encode(format, &inner));
        }
    }

    Err(Error::Decode("content is not a recognised image".to_string()))
}

fn unwrap_text_layer(bytes: &[u8]) -> Option<Vec<u8>> {
    let text = std::str::from_utf8(bytes).ok()?.trim();
    match split_data_uri(text) {
        Ok(Some((_, body))) => decode_base64(body),
        Ok(None) => decode_base64(text),
        Err(_) => None,
    }
}

fn note_declared_mismatch(declared: Option<&str>, sniffed: ImageFormat) {
    if let Some(mime) = declared {
        if ImageFormat::from_mime(mime) != Some(sniffed) {
            debug!(
                declared = mime,
                sniffed = sniffed.mime_type(),
                "Declared MIME type disagrees with content, using sniffed type"
            );
        }
    }
}

fn decode_base64(text: &str) -> Option<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }
    [&STANDARD, &STANDARD_NO_PAD, &URL_SAFE, &URL_SAFE_NO_PAD]
        .into_iter()
        .find_map(|engine| engine.decode(&compact).ok())
        .filter(|bytes| !bytes.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    fn png_bytes() -> Vec<u8> {
        let mut bytes = PNG_HEADER.to_vec();
        bytes.extend_from_slice(b"\x00\x00\x00\x0dIHDRfake-image-body");
        bytes
    }

    #[test]
    fn test_sniff_formats() {
        assert_eq!(ImageFormat::sniff(&png_bytes()), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::sniff(b"GIF89a...."), Some(ImageFormat::Gif));

        let mut webp = vec![0u8; 12];
        webp[0..4].copy_from_slice(b"RIFF");
        webp[8..12].copy_from_slice(b"WEBP");
        assert_eq!(ImageFormat::sniff(&webp), Some(ImageFormat::WebP));

        assert_eq!(ImageFormat::sniff(&[0x00, 0x01, 0x02]), None);
    }

    #[test]
    fn test_raw_bytes_encoded_once() {
        let uri = decode(&ImagePayload::Bytes(png_bytes())).unwrap();
        assert!(uri.as_str().starts_with("data:image/png;base64,iVBOR"));
        assert_eq!(uri.to_bytes().unwrap(), png_bytes());
    }

    #[test]
    fn test_plain_base64_text() {
        let text = STANDARD.encode(png_bytes());
        let uri = decode(&ImagePayload::Base64(text.clone())).unwrap();
        assert_eq!(uri.base64_data(), text);
    }

    #[test]
    fn test_double_encoded_base64_unwrapped() {
        let once = STANDARD.encode(png_bytes());
        let twice = STANDARD.encode(once.as_bytes());

        let uri = decode(&ImagePayload::Base64(twice)).unwrap();
        assert_eq!(uri.base64_data(), once);
        assert_eq!(uri.to_bytes().unwrap(), png_bytes());
    }

    #[test]
    fn test_bytes_holding_base64_text() {
        let text = STANDARD.encode(png_bytes());
        let uri = decode(&ImagePayload::Bytes(text.into_bytes())).unwrap();
        assert_eq!(uri.to_bytes().unwrap(), png_bytes());
    }

    #[test]
    fn test_canonical_uri_is_idempotent() {
        let first = decode(&ImagePayload::Bytes(png_bytes())).unwrap();
        let second = decode(&ImagePayload::Base64(first.to_string())).unwrap();
        let third = ImageDataUri::parse(second.as_str()).unwrap();

        assert_eq!(first.as_str(), second.as_str());
        assert_eq!(second, third);
    }

    #[test]
    fn test_mislabelled_data_uri_recanonicalised() {
        let text = format!("data:image/jpeg;base64,{}", STANDARD.encode(png_bytes()));
        let uri = decode(&ImagePayload::Base64(text)).unwrap();
        assert_eq!(uri.format(), ImageFormat::Png);
        assert!(uri.as_str().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_structured_payload_prefers_sniffed_type() {
        let payload = ImagePayload::Structured {
            mime_type: Some("image/webp".to_string()),
            data: PayloadData::Base64(STANDARD.encode(png_bytes())),
        };
        let uri = decode(&payload).unwrap();
        assert_eq!(uri.mime_type(), "image/png");

        let payload = ImagePayload::Structured {
            mime_type: Some("image/png".to_string()),
            data: PayloadData::Bytes(png_bytes()),
        };
        assert_eq!(decode(&payload).unwrap().mime_type(), "image/png");
    }

    #[test]
    fn test_wrapped_base64_whitespace_tolerated() {
        let text = STANDARD.encode(png_bytes());
        let (head, tail) = text.split_at(10);
        let wrapped = format!("  {}\n{}\n", head, tail);
        let uri = decode(&ImagePayload::Base64(wrapped)).unwrap();
        assert_eq!(uri.base64_data(), text);
    }

    #[test]
    fn test_unrecognised_content_is_decode_error() {
        let empty = decode(&ImagePayload::Bytes(Vec::new()));
        assert!(matches!(empty, Err(Error::Decode(_))));

        let blank = decode(&ImagePayload::Base64("   ".to_string()));
        assert!(matches!(blank, Err(Error::Decode(_))));

        let garbage = decode(&ImagePayload::Bytes(vec![0x00, 0x13, 0x37, 0x42]));
        assert!(matches!(garbage, Err(Error::Decode(_))));

        let not_image = decode(&ImagePayload::Base64(STANDARD.encode(b"hello world")));
        assert!(matches!(not_image, Err(Error::Decode(_))));

        let not_base64 = decode(&ImagePayload::Base64("data:image/png,rawtext".to_string()));
        assert!(matches!(not_base64, Err(Error::Decode(_))));
    }

    #[test]
    fn test_serde_as_plain_string() {
        let uri = ImageDataUri::from_image_bytes(&png_bytes()).unwrap();
        let json = serde_json::to_string(&uri).unwrap();
        assert!(json.starts_with("\"data:image/png;base64,"));

        let back: ImageDataUri = serde_json::from_str(&json).unwrap();
        assert_eq!(back, uri);

        let bad: std::result::Result<ImageDataUri, _> = serde_json::from_str("\"not an image\"");
        assert!(bad.is_err());
    }
}
