//! Character set handling for fetched pages
//!
//! The history site serves EUC-JP; mirrors and saved copies are often UTF-8
//! or Shift_JIS with a `<meta charset>` declaration.

use encoding_rs::{Encoding, EUC_JP};
use once_cell::sync::Lazy;
use regex::Regex;

/// How far into the document to look for a charset declaration
const SNIFF_LIMIT: usize = 2048;

static CHARSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)charset\s*=\s*["']?([A-Za-z0-9_\-]+)"#).unwrap());

/// Decode raw page bytes to text. Invalid sequences become U+FFFD.
pub fn decode_markup(bytes: &[u8]) -> String {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    let encoding = declared_charset(bytes).unwrap_or(EUC_JP);
    let (decoded, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::debug!("Markup had invalid {} sequences", used.name());
    }
    decoded.into_owned()
}

/// Charset named in the document head, if recognised
fn declared_charset(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(SNIFF_LIMIT)]);
    let caps = CHARSET.captures(&head)?;
    Encoding::for_label(caps[1].as_bytes())
}
