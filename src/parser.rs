//! Header/body splitting for source documents.
//!
//! A document may open with a YAML header delimited by `---` lines:
//!
//! ```text
//! ---
//! title: Hello
//! tags: [rust, cli]
//! ---
//! Body text.
//! ```
//!
//! Parsing never fails. When the header is missing the metadata is empty and
//! the body is the whole text. When a header is present but unusable the
//! result is the same degraded shape, with a [`HeaderDefect`] attached so the
//! caller can decide whether that should count against the document.

use serde_yaml::Value as YamlValue;

use crate::metadata::Metadata;

const DELIMITER: &str = "---";

/// Why a header that was present got discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderDefect {
    /// Opening delimiter without a closing one.
    Unterminated,
    /// Header contents are not valid YAML.
    InvalidYaml(String),
    /// Valid YAML that is not a key/value map.
    NotAMapping,
}

impl std::fmt::Display for HeaderDefect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeaderDefect::Unterminated => write!(f, "header block has no closing delimiter"),
            HeaderDefect::InvalidYaml(msg) => write!(f, "header block is not valid YAML: {}", msg),
            HeaderDefect::NotAMapping => write!(f, "header block is not a key/value mapping"),
        }
    }
}

/// Result of splitting one document.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub metadata: Metadata,
    pub body: String,
    pub defect: Option<HeaderDefect>,
}

impl ParsedDocument {
    fn degraded(raw: &str, defect: HeaderDefect) -> Self {
        Self {
            metadata: Metadata::new(),
            body: raw.to_string(),
            defect: Some(defect),
        }
    }
}

/// Split raw document text into metadata and body.
pub fn parse_document(raw: &str) -> ParsedDocument {
    let text = raw.strip_prefix('\u{feff}').unwrap_or(raw);

    let Some(after_open) = strip_delimiter_line(text) else {
        return ParsedDocument {
            metadata: Metadata::new(),
            body: raw.to_string(),
            defect: None,
        };
    };

    let Some((header, body)) = split_at_closing(after_open) else {
        return ParsedDocument::degraded(raw, HeaderDefect::Unterminated);
    };

    if header.trim().is_empty() {
        return ParsedDocument {
            metadata: Metadata::new(),
            body: body.to_string(),
            defect: None,
        };
    }

    match serde_yaml::from_str::<YamlValue>(header) {
        Ok(YamlValue::Mapping(mapping)) => ParsedDocument {
            metadata: Metadata::from_yaml_mapping(&mapping),
            body: body.to_string(),
            defect: None,
        },
        Ok(YamlValue::Null) => ParsedDocument {
            metadata: Metadata::new(),
            body: body.to_string(),
            defect: None,
        },
        Ok(_) => ParsedDocument::degraded(raw, HeaderDefect::NotAMapping),
        Err(e) => ParsedDocument::degraded(raw, HeaderDefect::InvalidYaml(e.to_string())),
    }
}

/// If `text` starts with a delimiter line, return what follows it.
fn strip_delimiter_line(text: &str) -> Option<&str> {
    let rest = text.strip_prefix(DELIMITER)?;
    let rest = rest.trim_start_matches([' ', '\t']);
    if let Some(r) = rest.strip_prefix("\r\n") {
        Some(r)
    } else if let Some(r) = rest.strip_prefix('\n') {
        Some(r)
    } else if rest.is_empty() {
        Some(rest)
    } else {
        None
    }
}

/// Find the closing delimiter line; returns (header, body).
fn split_at_closing(text: &str) -> Option<(&str, &str)> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim_end() == DELIMITER {
            let header = &text[..offset];
            let body = &text[offset + line.len()..];
            return Some((header, body));
        }
        offset += line.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetaValue;

    #[test]
    fn splits_header_and_body() {
        let doc = parse_document("---\ntitle: Hello\ntags: [a, b]\n---\nBody here.\n");
        assert_eq!(doc.metadata.text("title"), Some("Hello"));
        assert_eq!(
            doc.metadata.get("tags"),
            Some(&MetaValue::List(vec!["a".into(), "b".into()]))
        );
        assert_eq!(doc.body, "Body here.\n");
        assert!(doc.defect.is_none());
    }

    #[test]
    fn no_header_is_not_a_defect() {
        let raw = "# Just a heading\n\nText.";
        let doc = parse_document(raw);
        assert!(doc.metadata.is_empty());
        assert_eq!(doc.body, raw);
        assert!(doc.defect.is_none());
    }

    #[test]
    fn unterminated_header_degrades() {
        let raw = "---\ntitle: Hello\nBody without closing line.";
        let doc = parse_document(raw);
        assert!(doc.metadata.is_empty());
        assert_eq!(doc.body, raw);
        assert_eq!(doc.defect, Some(HeaderDefect::Unterminated));
    }

    #[test]
    fn invalid_yaml_degrades() {
        let raw = "---\ntitle: [unclosed\n---\nBody";
        let doc = parse_document(raw);
        assert!(doc.metadata.is_empty());
        assert_eq!(doc.body, raw);
        assert!(matches!(doc.defect, Some(HeaderDefect::InvalidYaml(_))));
    }

    #[test]
    fn scalar_header_is_not_a_mapping() {
        let doc = parse_document("---\njust a string\n---\nBody");
        assert_eq!(doc.defect, Some(HeaderDefect::NotAMapping));
    }

    #[test]
    fn empty_header_is_valid() {
        let doc = parse_document("---\n---\nBody");
        assert!(doc.metadata.is_empty());
        assert_eq!(doc.body, "Body");
        assert!(doc.defect.is_none());
    }

    #[test]
    fn crlf_and_bom_are_tolerated() {
        let doc = parse_document("\u{feff}---\r\ntitle: Win\r\n---\r\nBody\r\n");
        assert_eq!(doc.metadata.text("title"), Some("Win"));
        assert_eq!(doc.body, "Body\r\n");
    }

    #[test]
    fn horizontal_rule_in_body_is_kept() {
        let doc = parse_document("---\ntitle: A\n---\nIntro\n\n---\n\nMore");
        assert_eq!(doc.body, "Intro\n\n---\n\nMore");
    }

    #[test]
    fn dashes_prefix_without_newline_is_body() {
        let raw = "----- not a header";
        let doc = parse_document(raw);
        assert!(doc.defect.is_none());
        assert_eq!(doc.body, raw);
    }
}
