//! Category and tag extraction.
//!
//! Header fields for taxonomy come in several shapes: a list, a single
//! string, or a string with `,`/`;` separators. [`extract_names`] reduces all
//! of them to a list of trimmed names, one per distinct slug, keeping the
//! first spelling seen. [`TaxonomyAccumulator`] collects those names across
//! the whole corpus while documents are processed concurrently.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use crate::metadata::{MetaValue, Metadata};
use crate::models::{TaxonomyEntity, TaxonomyKind};
use crate::normalize::slugify;

/// Names from one metadata value, deduplicated by slug.
pub fn extract_names(value: Option<&MetaValue>) -> Vec<String> {
    let raw: Vec<&str> = match value {
        Some(MetaValue::String(s)) => s.split([',', ';']).collect(),
        Some(MetaValue::List(items)) => items.iter().map(String::as_str).collect(),
        _ => Vec::new(),
    };

    let mut seen = std::collections::HashSet::new();
    raw.into_iter()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .filter(|name| {
            let slug = slugify(name);
            !slug.is_empty() && seen.insert(slug)
        })
        .map(str::to_string)
        .collect()
}

/// Names of `kind` referenced by a document's metadata.
///
/// Uses the first of the kind's keys (`categories`/`category`,
/// `tags`/`tag`) that holds a non-null value.
pub fn names_for(metadata: &Metadata, kind: TaxonomyKind) -> Vec<String> {
    let value = kind
        .metadata_keys()
        .into_iter()
        .filter_map(|key| metadata.get(key))
        .find(|v| !matches!(v, MetaValue::Null));
    extract_names(value)
}

/// Category and tag names for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentTaxonomy {
    pub categories: Vec<String>,
    pub tags: Vec<String>,
}

impl DocumentTaxonomy {
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            categories: names_for(metadata, TaxonomyKind::Category),
            tags: names_for(metadata, TaxonomyKind::Tag),
        }
    }

    pub fn names(&self, kind: TaxonomyKind) -> &[String] {
        match kind {
            TaxonomyKind::Category => &self.categories,
            TaxonomyKind::Tag => &self.tags,
        }
    }
}

/// Run-scoped set of every distinct category and tag, keyed by slug.
///
/// Shared between concurrent document tasks; the first name recorded for a
/// slug is the one kept.
#[derive(Debug, Default)]
pub struct TaxonomyAccumulator {
    categories: Mutex<BTreeMap<String, String>>,
    tags: Mutex<BTreeMap<String, String>>,
}

impl TaxonomyAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, kind: TaxonomyKind) -> &Mutex<BTreeMap<String, String>> {
        match kind {
            TaxonomyKind::Category => &self.categories,
            TaxonomyKind::Tag => &self.tags,
        }
    }

    pub fn record(&self, kind: TaxonomyKind, names: &[String]) {
        if names.is_empty() {
            return;
        }
        let mut set = self.set(kind).lock().unwrap_or_else(PoisonError::into_inner);
        for name in names {
            let slug = slugify(name);
            if !slug.is_empty() {
                set.entry(slug).or_insert_with(|| name.clone());
            }
        }
    }

    pub fn record_document(&self, taxonomy: &DocumentTaxonomy) {
        for kind in TaxonomyKind::ALL {
            self.record(kind, taxonomy.names(kind));
        }
    }

    pub fn len(&self, kind: TaxonomyKind) -> usize {
        self.set(kind)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Snapshot of the accumulated entities of `kind`, ordered by slug.
    pub fn entities(&self, kind: TaxonomyKind) -> Vec<TaxonomyEntity> {
        self.set(kind)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(slug, name)| TaxonomyEntity {
                kind,
                name: name.clone(),
                slug: slug.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn list(items: &[&str]) -> MetaValue {
        MetaValue::List(items.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn splits_delimited_strings() {
        let names = extract_names(Some(&MetaValue::String("rust, web ;cli,, ".into())));
        assert_eq!(names, vec!["rust", "web", "cli"]);
    }

    #[test]
    fn list_items_are_trimmed() {
        let names = extract_names(Some(&list(&[" Rust ", "", "Web Dev"])));
        assert_eq!(names, vec!["Rust", "Web Dev"]);
    }

    #[test]
    fn first_spelling_wins_within_document() {
        let names = extract_names(Some(&list(&["React", "react", "REACT"])));
        assert_eq!(names, vec!["React"]);
    }

    #[test]
    fn unsluggable_and_non_string_values_are_dropped() {
        assert_eq!(extract_names(Some(&list(&["!!!", "ok"]))), vec!["ok"]);
        assert!(extract_names(Some(&MetaValue::Number(3.0))).is_empty());
        assert!(extract_names(Some(&MetaValue::Bool(true))).is_empty());
        assert!(extract_names(None).is_empty());
    }

    #[test]
    fn singular_key_is_a_fallback() {
        let mut m = Metadata::new();
        m.insert("category", MetaValue::String("Guides".into()));
        m.insert("tag", MetaValue::String("one".into()));
        m.insert("tags", MetaValue::Null);
        let t = DocumentTaxonomy::from_metadata(&m);
        assert_eq!(t.categories, vec!["Guides"]);
        assert_eq!(t.tags, vec!["one"]);

        m.insert("categories", list(&["Primary"]));
        assert_eq!(names_for(&m, TaxonomyKind::Category), vec!["Primary"]);
    }

    #[test]
    fn accumulator_folds_case_across_documents() {
        let acc = TaxonomyAccumulator::new();
        acc.record(TaxonomyKind::Tag, &["React".to_string()]);
        acc.record(TaxonomyKind::Tag, &["react".to_string(), "Rust".to_string()]);
        assert_eq!(acc.len(TaxonomyKind::Tag), 2);
        assert_eq!(acc.len(TaxonomyKind::Category), 0);

        let tags = acc.entities(TaxonomyKind::Tag);
        assert_eq!(tags[0].slug, "react");
        assert_eq!(tags[0].name, "React");
        assert_eq!(tags[1].slug, "rust");
    }

    #[test]
    fn accented_spellings_share_one_entity() {
        assert_eq!(extract_names(Some(&list(&["Café", "Cafe"]))), vec!["Café"]);

        let acc = TaxonomyAccumulator::new();
        acc.record(TaxonomyKind::Tag, &["Café".to_string()]);
        acc.record(TaxonomyKind::Tag, &["Cafe".to_string()]);
        let tags = acc.entities(TaxonomyKind::Tag);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].slug, "cafe");
        assert_eq!(tags[0].name, "Café");
    }

    #[test]
    fn accumulator_is_safe_across_threads() {
        let acc = Arc::new(TaxonomyAccumulator::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let acc = acc.clone();
                std::thread::spawn(move || {
                    for j in 0..50 {
                        acc.record(TaxonomyKind::Category, &[format!("cat {}", (i * 50 + j) % 100)]);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(acc.len(TaxonomyKind::Category), 100);
    }
}
