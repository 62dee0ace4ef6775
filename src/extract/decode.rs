//! Byte-to-text decoding with a declared fallback encoding

use encoding_rs::{Encoding, UTF_8};
use std::borrow::Cow;

/// Text decoded from raw page bytes
#[derive(Debug)]
pub struct DecodedPage<'a> {
    pub text: Cow<'a, str>,

    /// The encoding that actually produced `text`
    pub encoding: &'static Encoding,

    /// Whether malformed sequences were replaced with U+FFFD
    pub had_errors: bool,
}

/// Decodes page bytes without ever failing
///
/// A byte order mark wins. Otherwise bytes that are valid UTF-8 are taken as
/// is, and anything else is decoded with `fallback`, substituting the
/// replacement character for undecodable sequences.
pub fn decode_page<'a>(bytes: &'a [u8], fallback: &'static Encoding) -> DecodedPage<'a> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, had_errors) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return DecodedPage {
            text,
            encoding,
            had_errors,
        };
    }

    if let Some(text) = UTF_8.decode_without_bom_handling_and_without_replacement(bytes) {
        return DecodedPage {
            text,
            encoding: UTF_8,
            had_errors: false,
        };
    }

    let (text, had_errors) = fallback.decode_without_bom_handling(bytes);
    if had_errors {
        tracing::debug!(
            "Replaced undecodable bytes while decoding with {}",
            fallback.name()
        );
    }

    DecodedPage {
        text,
        encoding: fallback,
        had_errors,
    }
}
