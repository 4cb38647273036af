//! Page-number resolution from loosely-typed chunk metadata.
//!
//! Loaders disagree on how they record pages: some write a 0-based
//! `page`/`page_index`, some a 1-based `page_number`, and some nest the
//! value under `loc`. [`resolve_page`] walks an ordered list of
//! [`PageRule`]s and returns the first match as a 1-based page number.
//! This is a best-effort guess, not a contract with any loader.

use serde_json::Value;

use crate::models::Metadata;

/// Numbering base of a metadata key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageBase {
    Zero,
    One,
}

/// One extraction rule: a key path into the metadata and its numbering base.
#[derive(Debug, Clone, Copy)]
pub struct PageRule {
    pub path: &'static [&'static str],
    pub base: PageBase,
}

/// Rules in priority order.
pub const PAGE_RULES: &[PageRule] = &[
    PageRule {
        path: &["page"],
        base: PageBase::Zero,
    },
    PageRule {
        path: &["page_index"],
        base: PageBase::Zero,
    },
    PageRule {
        path: &["page_number"],
        base: PageBase::One,
    },
    PageRule {
        path: &["loc", "page_number"],
        base: PageBase::One,
    },
    PageRule {
        path: &["loc", "page"],
        base: PageBase::Zero,
    },
    PageRule {
        path: &["loc", "pageIndex"],
        base: PageBase::Zero,
    },
    PageRule {
        path: &["loc", "pageNumber"],
        base: PageBase::One,
    },
];

/// Outcome of applying a single rule.
enum RuleMatch {
    /// Key absent or not an integer: try the next rule.
    Skip,
    /// Key present with an integer value; `None` when out of range.
    Decided(Option<u32>),
}

impl PageRule {
    fn apply(&self, metadata: &Metadata) -> RuleMatch {
        let Some((first, rest)) = self.path.split_first() else {
            return RuleMatch::Skip;
        };
        let mut value = match metadata.get(*first) {
            Some(v) => v,
            None => return RuleMatch::Skip,
        };
        for key in rest {
            value = match value.as_object().and_then(|o| o.get(*key)) {
                Some(v) => v,
                None => return RuleMatch::Skip,
            };
        }
        let Some(n) = as_integer(value) else {
            return RuleMatch::Skip;
        };
        let page = match self.base {
            PageBase::Zero if n >= 0 => u32::try_from(n + 1).ok(),
            PageBase::One if n >= 1 => u32::try_from(n).ok(),
            _ => None,
        };
        RuleMatch::Decided(page)
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Resolve a 1-based page number from chunk metadata, or `None` when unknown.
pub fn resolve_page(metadata: &Metadata) -> Option<u32> {
    for rule in PAGE_RULES {
        if let RuleMatch::Decided(page) = rule.apply(metadata) {
            return page;
        }
    }
    None
}

/// Whether a source path or URL names a PDF (case-insensitive suffix).
pub fn is_pdf(source: &str) -> bool {
    source.to_ascii_lowercase().ends_with(".pdf")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn meta(v: Value) -> Metadata {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_page_index_is_zero_based() {
        assert_eq!(resolve_page(&meta(json!({"page_index": 2}))), Some(3));
    }

    #[test]
    fn test_page_number_is_one_based() {
        assert_eq!(resolve_page(&meta(json!({"page_number": 3}))), Some(3));
    }

    #[test]
    fn test_no_page_keys() {
        assert_eq!(resolve_page(&meta(json!({"source": "a.pdf"}))), None);
    }

    #[test]
    fn test_page_takes_priority() {
        let m = meta(json!({"page": 0, "page_number": 9}));
        assert_eq!(resolve_page(&m), Some(1));
    }

    #[test]
    fn test_string_values_parse() {
        assert_eq!(resolve_page(&meta(json!({"page": "4"}))), Some(5));
    }

    #[test]
    fn test_unparsable_falls_through() {
        let m = meta(json!({"page": "n/a", "page_number": 7}));
        assert_eq!(resolve_page(&m), Some(7));
    }

    #[test]
    fn test_negative_page_stops_search() {
        let m = meta(json!({"page": -1, "page_number": 7}));
        assert_eq!(resolve_page(&m), None);
    }

    #[test]
    fn test_nested_loc() {
        assert_eq!(resolve_page(&meta(json!({"loc": {"page": 0}}))), Some(1));
        assert_eq!(
            resolve_page(&meta(json!({"loc": {"pageNumber": 12}}))),
            Some(12)
        );
        assert_eq!(resolve_page(&meta(json!({"loc": "line 3"}))), None);
    }

    #[test]
    fn test_is_pdf() {
        assert!(is_pdf("docs/Manual.PDF"));
        assert!(!is_pdf("https://example.com/page"));
        assert!(!is_pdf("notes.pdf.txt"));
    }

    proptest! {
        #[test]
        fn zero_based_keys_add_one(n in 0i64..100_000) {
            prop_assert_eq!(resolve_page(&meta(json!({"page": n}))), Some(n as u32 + 1));
            prop_assert_eq!(resolve_page(&meta(json!({"page_index": n}))), Some(n as u32 + 1));
        }

        #[test]
        fn one_based_key_unchanged(n in 1i64..100_000) {
            prop_assert_eq!(resolve_page(&meta(json!({"page_number": n}))), Some(n as u32));
        }
    }
}
