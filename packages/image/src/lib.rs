#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Image payload validation and decoding.
//!
//! Clients submit images either as a data URL
//! (`data:image/png;base64,....`) or as bare base64. [`is_valid`] is a
//! cheap syntactic check; [`decode`] splits out the MIME type and decodes
//! the bytes.

use std::sync::LazyLock;

use base64::Engine as _;
use base64::alphabet;
use base64::engine::general_purpose::STANDARD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use regex::Regex;
use thiserror::Error;

/// MIME type assumed for bare base64 payloads.
pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// Data URL prefix with one of the accepted image subtypes.
static DATA_URL_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^data:image/(jpeg|jpg|png|gif|webp);base64,").unwrap_or_else(|_| unreachable!())
});

/// Full data URL, capturing the MIME type and the encoded data.
static DATA_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^data:(image/[a-zA-Z]+);base64,(.+)$").unwrap_or_else(|_| unreachable!())
});

/// Standard alphabet, padding optional on decode.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Bare base64 content.
static RAW_BASE64: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9+/]+=*$").unwrap_or_else(|_| unreachable!()));

/// Errors that can occur while decoding an image payload.
#[derive(Debug, Error)]
pub enum ImageError {
    /// The payload is neither a supported data URL nor bare base64.
    #[error("Invalid base64 image format")]
    Invalid,

    /// The payload looked like base64 but did not decode.
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// An image payload split into its MIME type and raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// Decoded image bytes.
    pub bytes: Vec<u8>,
    /// MIME type, e.g. `image/png`.
    pub mime_type: String,
    /// Padded standard base64 of `bytes`, without any data URL prefix.
    pub base64: String,
}

impl DecodedImage {
    /// Builds a decoded image from raw bytes, encoding them once so
    /// providers that want base64 can reuse it.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        let base64 = STANDARD.encode(&bytes);
        Self {
            bytes,
            mime_type: mime_type.into(),
            base64,
        }
    }

    /// Renders the image as a `data:` URL.
    #[must_use]
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }
}

/// Guesses an image MIME type from a file extension, case-insensitively.
/// Returns `None` for anything other than the supported subtypes.
#[must_use]
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Returns `true` if `payload` is a data URL for a supported image subtype
/// or bare base64 text.
///
/// Purely syntactic: a `true` result does not mean the bytes form a real
/// image.
#[must_use]
pub fn is_valid(payload: &str) -> bool {
    !payload.is_empty() && (DATA_URL_PREFIX.is_match(payload) || RAW_BASE64.is_match(payload))
}

/// Splits a payload into `(mime_type, base64_data)` without decoding.
///
/// Data URLs yield their declared MIME type, with `image/jpg` spelled
/// `image/jpeg`; anything else is treated as bare base64 with
/// [`DEFAULT_MIME_TYPE`].
#[must_use]
pub fn split_data_url(payload: &str) -> (&str, &str) {
    DATA_URL.captures(payload).map_or(
        (DEFAULT_MIME_TYPE, payload),
        |caps| match (caps.get(1), caps.get(2)) {
            (Some(mime), Some(data)) if mime.as_str() == "image/jpg" => {
                (DEFAULT_MIME_TYPE, data.as_str())
            }
            (Some(mime), Some(data)) => (mime.as_str(), data.as_str()),
            _ => (DEFAULT_MIME_TYPE, payload),
        },
    )
}

/// Validates and decodes an image payload.
///
/// Line breaks inside the data and missing `=` padding are tolerated.
///
/// # Errors
///
/// * [`ImageError::Invalid`] if [`is_valid`] rejects the payload
/// * [`ImageError::Base64`] if the data is not decodable base64
pub fn decode(payload: &str) -> Result<DecodedImage, ImageError> {
    if !is_valid(payload) {
        return Err(ImageError::Invalid);
    }

    let (mime_type, data) = split_data_url(payload);
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = LENIENT.decode(compact)?;

    log::trace!("Decoded {} byte {mime_type} image", bytes.len());

    Ok(DecodedImage::from_bytes(bytes, mime_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    // "hello" in base64
    const HELLO: &str = "aGVsbG8=";

    #[test]
    fn accepts_supported_data_urls() {
        for subtype in ["jpeg", "jpg", "png", "gif", "webp"] {
            let payload = format!("data:image/{subtype};base64,{HELLO}");
            assert!(is_valid(&payload), "{subtype} should be accepted");
        }
    }

    #[test]
    fn rejects_unsupported_data_url_subtype() {
        assert!(!is_valid(&format!("data:image/bmp;base64,{HELLO}")));
        assert!(!is_valid(&format!("data:text/plain;base64,{HELLO}")));
    }

    #[test]
    fn accepts_raw_base64() {
        assert!(is_valid(HELLO));
        assert!(is_valid("QUJD"));
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert!(!is_valid(""));
        assert!(!is_valid("not base64!"));
        assert!(!is_valid("abc def"));
    }

    #[test]
    fn decodes_data_url_with_declared_mime() {
        let image = decode(&format!("data:image/png;base64,{HELLO}")).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.bytes, b"hello");
        assert_eq!(image.base64, HELLO);
    }

    #[test]
    fn decodes_raw_base64_as_jpeg() {
        let image = decode(HELLO).unwrap();
        assert_eq!(image.mime_type, DEFAULT_MIME_TYPE);
        assert_eq!(image.bytes, b"hello");
    }

    #[test]
    fn decodes_unpadded_base64() {
        assert!(is_valid("QUJDRA"));
        let image = decode("QUJDRA").unwrap();
        assert_eq!(image.bytes, b"ABCD");
        assert_eq!(image.base64, "QUJDRA==");
    }

    #[test]
    fn decodes_line_wrapped_data_url() {
        let payload = "data:image/png;base64,aGVs\nbG8=\r\n";
        assert!(is_valid(payload));
        let image = decode(payload).unwrap();
        assert_eq!(image.bytes, b"hello");
        assert_eq!(image.base64, HELLO);
        assert_eq!(image.to_data_url(), "data:image/png;base64,aGVsbG8=");
    }

    #[test]
    fn jpg_subtype_is_reported_as_jpeg() {
        let payload = format!("data:image/jpg;base64,{HELLO}");
        assert_eq!(split_data_url(&payload), ("image/jpeg", HELLO));
        assert_eq!(decode(&payload).unwrap().mime_type, "image/jpeg");
    }

    #[test]
    fn decode_rejects_invalid_payload() {
        assert!(matches!(decode("???"), Err(ImageError::Invalid)));
    }

    #[test]
    fn decode_reports_bad_base64() {
        // Matches the raw pattern but has an impossible length.
        assert!(matches!(decode("abcde"), Err(ImageError::Base64(_))));
    }

    #[test]
    fn from_bytes_round_trips_encoding() {
        let image = DecodedImage::from_bytes(b"hello".to_vec(), "image/gif");
        assert_eq!(image.base64, HELLO);
        assert_eq!(image.mime_type, "image/gif");
    }

    #[test]
    fn data_url_from_bytes_is_valid_and_decodes() {
        let image = DecodedImage::from_bytes(b"hello".to_vec(), "image/png");
        let url = image.to_data_url();

        assert_eq!(url, "data:image/png;base64,aGVsbG8=");
        assert!(is_valid(&url));
        assert_eq!(decode(&url).unwrap(), image);
    }

    #[test]
    fn maps_known_extensions() {
        assert_eq!(mime_for_extension("JPG"), Some("image/jpeg"));
        assert_eq!(mime_for_extension("webp"), Some("image/webp"));
        assert_eq!(mime_for_extension("bmp"), None);
    }
}
