use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::error::CatalogError;
use crate::models::{CatalogDocument, CatalogStats, IntentEntry, RawIntent};

/// Immutable table of intents and their response pools.
///
/// The catalog also owns the canonical label ordering: index `i` of a classifier
/// score vector always refers to `tag_order()[i]`.
#[derive(Debug, Clone)]
pub struct IntentCatalog {
    entries: Vec<IntentEntry>,
    tag_order: Vec<String>,
    by_label: HashMap<String, Vec<usize>>,
}

impl IntentCatalog {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json_str(&raw)?;

        info!(
            path = %path.display(),
            intents = catalog.len(),
            labels = catalog.tag_order.len(),
            "intent catalog loaded"
        );
        Ok(catalog)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let document: CatalogDocument = serde_json::from_str(raw)?;
        Self::from_document(document)
    }

    pub fn from_document(document: CatalogDocument) -> Result<Self, CatalogError> {
        let entries = document
            .intents
            .into_iter()
            .enumerate()
            .map(|(index, raw)| entry_from_raw(index, raw))
            .collect::<Result<Vec<_>, _>>()?;

        Self::build(entries, document.classes)
    }

    /// Builds a catalog whose label ordering is derived from load order.
    pub fn from_entries(entries: Vec<IntentEntry>) -> Result<Self, CatalogError> {
        Self::build(entries, None)
    }

    /// Builds a catalog with an explicit classifier label ordering.
    pub fn with_tag_order(
        entries: Vec<IntentEntry>,
        classes: Vec<String>,
    ) -> Result<Self, CatalogError> {
        Self::build(entries, Some(classes))
    }

    fn build(
        entries: Vec<IntentEntry>,
        classes: Option<Vec<String>>,
    ) -> Result<Self, CatalogError> {
        if entries.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut entries = entries;
        let mut seen_tags = HashSet::new();
        for (index, entry) in entries.iter_mut().enumerate() {
            entry.tag = entry.tag.trim().to_string();
            if entry.tag.is_empty() {
                return Err(CatalogError::MissingTag { index });
            }
            if !seen_tags.insert(entry.tag.clone()) {
                return Err(CatalogError::DuplicateTag(entry.tag.clone()));
            }
            if entry.responses.is_empty() {
                return Err(CatalogError::EmptyResponses(entry.tag.clone()));
            }
            entry.aliases = clean_aliases(&entry.tag, std::mem::take(&mut entry.aliases));
        }

        let mut by_label: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, entry) in entries.iter().enumerate() {
            for label in std::iter::once(&entry.tag).chain(entry.aliases.iter()) {
                by_label.entry(label.clone()).or_default().push(index);
            }
        }

        let tag_order = match classes {
            Some(classes) => {
                let mut seen = HashSet::new();
                for class in &classes {
                    if !seen.insert(class.as_str()) {
                        return Err(CatalogError::DuplicateClass(class.clone()));
                    }
                    if !by_label.contains_key(class) {
                        warn!(label = %class, "classifier label has no catalog entry");
                    }
                }
                classes
            }
            None => derive_tag_order(&entries),
        };

        Ok(Self {
            entries,
            tag_order,
            by_label,
        })
    }

    pub fn entries(&self) -> &[IntentEntry] {
        &self.entries
    }

    pub fn tag_order(&self) -> &[String] {
        &self.tag_order
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.by_label.contains_key(label)
    }

    /// Every entry whose tag or alias set contains `label`, in load order.
    pub fn entries_for<'a>(&'a self, label: &str) -> impl Iterator<Item = &'a IntentEntry> + 'a {
        self.by_label
            .get(label)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|index| &self.entries[*index])
    }

    /// Union of the response pools of every entry matching `label`. Empty when the
    /// label is unknown.
    pub fn lookup(&self, label: &str) -> Vec<&str> {
        self.entries_for(label)
            .flat_map(|entry| entry.responses.iter().map(String::as_str))
            .collect()
    }

    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            intents: self.entries.len(),
            labels: self.tag_order.len(),
            responses: self.entries.iter().map(|entry| entry.responses.len()).sum(),
            unresolved_labels: self
                .tag_order
                .iter()
                .filter(|label| !self.contains(label))
                .cloned()
                .collect(),
        }
    }
}

fn entry_from_raw(index: usize, raw: RawIntent) -> Result<IntentEntry, CatalogError> {
    let mut qtype = raw
        .qtype
        .into_vec()
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect::<Vec<_>>();

    let tag = match raw.tag.map(|tag| tag.trim().to_string()) {
        Some(tag) if !tag.is_empty() => tag,
        _ if !qtype.is_empty() => qtype.remove(0),
        _ => return Err(CatalogError::MissingTag { index }),
    };

    Ok(IntentEntry {
        tag,
        aliases: qtype,
        responses: raw.responses,
        patterns: raw.patterns,
    })
}

fn clean_aliases(tag: &str, aliases: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    aliases
        .into_iter()
        .map(|alias| alias.trim().to_string())
        .filter(|alias| !alias.is_empty() && alias != tag)
        .filter(|alias| seen.insert(alias.clone()))
        .collect()
}

fn derive_tag_order(entries: &[IntentEntry]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    for entry in entries {
        for label in std::iter::once(&entry.tag).chain(entry.aliases.iter()) {
            if seen.insert(label.as_str()) {
                order.push(label.clone());
            }
        }
    }
    order
}
