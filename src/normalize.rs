//! Canonical field derivation.
//!
//! Every field of a content row is derived by a small pure function that
//! walks an explicit precedence order over the header metadata and falls
//! back to something derived from the file path. Nothing here does I/O or
//! returns an error: every field has a defined fallback.
//!
//! | Field | Precedence |
//! |-------|------------|
//! | slug | `slug` → file stem without date prefix, slugified |
//! | title | `title` → humanized file stem |
//! | status | `draft: true` / `status: draft` → `published: false` → `status: archived` → published |
//! | kind | `type` → `pages/` or `projects/` path segment → post |
//! | published_at | `date` → `published` → `publishedAt` |
//! | excerpt | `excerpt` → `description` → generated from the body |
//! | meta_description | `metaDescription` → `meta_description` |
//! | featured_image | `image` → `featured_image` → `featuredImage` |

use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use sha2::{Digest, Sha256};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::metadata::Metadata;
use crate::models::{ContentKind, Status};

/// Default maximum excerpt length, in characters.
pub const DEFAULT_EXCERPT_LENGTH: usize = 160;

const ELLIPSIS: &str = "...";

/// Fields derived for one document.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFields {
    pub slug: String,
    pub title: String,
    pub body: String,
    pub excerpt: String,
    pub meta_description: Option<String>,
    pub featured_image: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub status: Status,
    pub kind: ContentKind,
}

/// Derive every canonical field for a document.
///
/// `relative_path` is the document's path relative to the content root; it
/// drives slug, title and kind inference.
pub fn normalize(
    metadata: &Metadata,
    body: &str,
    relative_path: &Path,
    excerpt_length: usize,
) -> NormalizedFields {
    let body = clean_body(body);
    NormalizedFields {
        slug: derive_slug(metadata, relative_path),
        title: derive_title(metadata, relative_path),
        excerpt: derive_excerpt(metadata, &body, excerpt_length),
        meta_description: metadata
            .first_text(&["metaDescription", "meta_description"])
            .map(str::to_string),
        featured_image: metadata
            .first_text(&["image", "featured_image", "featuredImage"])
            .map(resolve_image_path),
        published_at: derive_published_at(metadata),
        status: derive_status(metadata),
        kind: derive_kind(metadata, relative_path),
        body,
    }
}

/// Lower-case ASCII slug; non-alphanumeric runs become a single `-`.
///
/// Accented letters are folded to their base letter first (`Café` → `cafe`),
/// so spellings that differ only in diacritics share a slug.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_separator = false;
    for c in fold_to_ascii(input).chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }
    slug
}

/// NFKD-decompose and drop combining marks. Letters with no decomposition
/// get a fixed Latin spelling.
fn fold_to_ascii(input: &str) -> String {
    let mut folded = String::with_capacity(input.len());
    for c in input.nfkd().filter(|c| !is_combining_mark(*c)) {
        match c {
            'ß' => folded.push_str("ss"),
            'æ' | 'Æ' => folded.push_str("ae"),
            'œ' | 'Œ' => folded.push_str("oe"),
            'ø' | 'Ø' => folded.push('o'),
            'đ' | 'Đ' => folded.push('d'),
            'ł' | 'Ł' => folded.push('l'),
            'þ' | 'Þ' => folded.push_str("th"),
            _ => folded.push(c),
        }
    }
    folded
}

/// Strip a leading `YYYY-MM-DD-` prefix from a file stem.
pub fn strip_date_prefix(stem: &str) -> &str {
    static DATE_PREFIX_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}-").expect("valid regex"));

    match DATE_PREFIX_RE.find(stem) {
        Some(m) => &stem[m.end()..],
        None => stem,
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

pub fn derive_slug(metadata: &Metadata, relative_path: &Path) -> String {
    if let Some(explicit) = metadata.text("slug") {
        return explicit.to_string();
    }

    let stem = file_stem(relative_path);
    let slug = slugify(strip_date_prefix(&stem));
    if !slug.is_empty() {
        return slug;
    }

    // Stems like "!!!.md" slugify to nothing; key them on the path instead.
    let mut hasher = Sha256::new();
    hasher.update(relative_path.to_string_lossy().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("untitled-{}", &digest[..12])
}

pub fn derive_title(metadata: &Metadata, relative_path: &Path) -> String {
    if let Some(explicit) = metadata.text("title") {
        return explicit.to_string();
    }
    humanize(strip_date_prefix(&file_stem(relative_path)))
}

/// `getting_started-guide` → `Getting Started Guide`.
fn humanize(stem: &str) -> String {
    stem.replace(['-', '_'], " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn derive_status(metadata: &Metadata) -> Status {
    let status_is = |value: &str| {
        metadata
            .text("status")
            .is_some_and(|s| s.eq_ignore_ascii_case(value))
    };

    if metadata.flag("draft") == Some(true) || status_is("draft") {
        Status::Draft
    } else if metadata.flag("published") == Some(false) {
        Status::Draft
    } else if status_is("archived") {
        Status::Archived
    } else {
        Status::Published
    }
}

pub fn derive_kind(metadata: &Metadata, relative_path: &Path) -> ContentKind {
    if let Some(kind) = metadata.text("type").and_then(ContentKind::parse) {
        return kind;
    }

    let has_segment = |name: &str| {
        relative_path
            .parent()
            .into_iter()
            .flat_map(|p| p.components())
            .any(|c| c.as_os_str().to_string_lossy().eq_ignore_ascii_case(name))
    };

    if has_segment("pages") {
        ContentKind::Page
    } else if has_segment("projects") {
        ContentKind::Project
    } else {
        ContentKind::Post
    }
}

pub fn derive_published_at(metadata: &Metadata) -> Option<DateTime<Utc>> {
    metadata
        .first_text(&["date", "published", "publishedAt"])
        .and_then(parse_timestamp)
}

/// Parse the timestamp shapes commonly found in front matter.
///
/// Naive forms (no offset) are taken as UTC.
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(input) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S %z") {
        return Some(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 5] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, format) {
            return Some(dt.and_utc());
        }
    }

    for format in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(input, format) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }

    None
}

/// Clean a document body for storage.
///
/// Drops a leftover header block and HTML comments, trims every line and
/// allows at most one blank line in a row.
pub fn clean_body(body: &str) -> String {
    static RESIDUAL_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\A\s*---[ \t]*\r?\n(?s:.*?)\r?\n---[ \t]*(?:\r?\n|\z)").expect("valid regex")
    });
    static COMMENT_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    let without_header = RESIDUAL_HEADER_RE.replace(body, "");
    let without_comments = COMMENT_RE.replace_all(&without_header, "");
    let trimmed_lines = without_comments
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");

    MULTI_BLANK_RE
        .replace_all(&trimmed_lines, "\n\n")
        .trim()
        .to_string()
}

pub fn derive_excerpt(metadata: &Metadata, cleaned_body: &str, max_len: usize) -> String {
    match metadata.first_text(&["excerpt", "description"]) {
        Some(explicit) => explicit.to_string(),
        None => generate_excerpt(cleaned_body, max_len),
    }
}

/// Plain-text summary of a Markdown body, cut at a word boundary.
pub fn generate_excerpt(markdown: &str, max_len: usize) -> String {
    let plain = strip_markup(markdown);
    truncate_at_word(&plain, max_len)
}

fn strip_markup(md: &str) -> String {
    static FENCED_CODE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("valid regex"));
    static IMAGE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").expect("valid regex"));
    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("valid regex"));
    static HEADING_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^#{1,6}\s+").expect("valid regex"));
    static BOLD_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*|__(.*?)__").expect("valid regex"));
    static ITALIC_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\*([^*\n]+)\*").expect("valid regex"));
    static INLINE_CODE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"`([^`]*)`").expect("valid regex"));
    static LEFTOVER_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[#*>`]").expect("valid regex"));
    static WHITESPACE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

    let text = FENCED_CODE_RE.replace_all(md, "");
    let text = IMAGE_RE.replace_all(&text, "$1");
    let text = LINK_RE.replace_all(&text, "$1");
    let text = HEADING_RE.replace_all(&text, "");
    let text = BOLD_RE.replace_all(&text, "$1$2");
    let text = ITALIC_RE.replace_all(&text, "$1");
    let text = INLINE_CODE_RE.replace_all(&text, "$1");
    let text = LEFTOVER_RE.replace_all(&text, "");
    WHITESPACE_RE.replace_all(&text, " ").trim().to_string()
}

fn truncate_at_word(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }

    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_len).collect();
    let cut_mid_word = chars.next().is_some_and(|c| !c.is_whitespace());

    let head = if cut_mid_word {
        match head.rfind(char::is_whitespace) {
            Some(idx) => &head[..idx],
            None => head.as_str(),
        }
    } else {
        head.as_str()
    };

    format!("{}{}", head.trim_end(), ELLIPSIS)
}

/// Map a header image reference to a site-absolute path.
///
/// `./a.png` and `../a.png` become `/a.png`, absolute paths and URLs are
/// kept, and bare names are assumed to live under `/images/`.
pub fn resolve_image_path(reference: &str) -> String {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return reference.to_string();
    }
    if let Some(rest) = reference
        .strip_prefix("./")
        .or_else(|| reference.strip_prefix("../"))
    {
        return format!("/{}", rest);
    }
    if reference.starts_with('/') {
        return reference.to_string();
    }
    format!("/images/{}", reference)
}
