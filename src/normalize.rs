//! Platform-conditional text canonicalization.
//!
//! On Windows, document text and string metadata are NFC-composed and
//! squeezed through Windows-31J (cp932), dropping characters that codepage
//! cannot represent. Elsewhere the text passes through unchanged. This
//! mitigates mojibake; it is lossy by construction.

use encoding_rs::SHIFT_JIS;
use serde_json::Value;
use unicode_normalization::UnicodeNormalization;

use crate::models::Document;

/// Canonicalize a string for the current platform.
pub fn adjust_string(s: &str) -> String {
    if cfg!(windows) {
        to_cp932_safe(s)
    } else {
        s.to_string()
    }
}

/// NFC-compose `s` and keep only characters encodable in Windows-31J.
pub fn to_cp932_safe(s: &str) -> String {
    let composed: String = s.nfc().collect();
    let mut kept = String::with_capacity(composed.len());
    let mut buf = [0u8; 4];
    for c in composed.chars() {
        let (_, _, had_errors) = SHIFT_JIS.encode(c.encode_utf8(&mut buf));
        if !had_errors {
            kept.push(c);
        }
    }
    let (bytes, _, _) = SHIFT_JIS.encode(&kept);
    let (decoded, _, _) = SHIFT_JIS.decode(&bytes);
    decoded.into_owned()
}

/// Rewrite a document's content and string-valued metadata in place.
pub fn normalize_document(doc: &mut Document) {
    normalize_document_with(doc, adjust_string);
}

fn normalize_document_with(doc: &mut Document, transform: impl Fn(&str) -> String) {
    doc.content = transform(&doc.content);
    for value in doc.metadata.values_mut() {
        if let Value::String(s) = value {
            *s = transform(s);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;
    use serde_json::json;

    #[test]
    fn test_nfc_composition() {
        // "が" as か + combining dakuten
        let decomposed = "\u{304B}\u{3099}";
        assert_eq!(to_cp932_safe(decomposed), "\u{304C}");
    }

    #[test]
    fn test_drops_unencodable() {
        assert_eq!(to_cp932_safe("社内🙂文書"), "社内文書");
    }

    #[test]
    fn test_ascii_and_japanese_survive() {
        let s = "議事録 2024 minutes";
        assert_eq!(to_cp932_safe(s), s);
    }

    #[cfg(not(windows))]
    #[test]
    fn test_passthrough_off_windows() {
        assert_eq!(adjust_string("🙂\u{304B}\u{3099}"), "🙂\u{304B}\u{3099}");
    }

    #[test]
    fn test_non_string_metadata_untouched() {
        let mut meta = Metadata::new();
        meta.insert("source".into(), json!("a🙂.txt"));
        meta.insert("page".into(), json!(3));
        let mut doc = Document::new("x🙂y", meta);
        normalize_document_with(&mut doc, to_cp932_safe);
        assert_eq!(doc.content, "xy");
        assert_eq!(doc.metadata["source"], json!("a.txt"));
        assert_eq!(doc.metadata["page"], json!(3));
    }
}
