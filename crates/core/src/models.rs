use serde::{Deserialize, Serialize};

/// One intent of the catalog together with its response pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentEntry {
    pub tag: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub responses: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl IntentEntry {
    pub fn new(tag: impl Into<String>, responses: Vec<String>) -> Self {
        Self {
            tag: tag.into(),
            aliases: Vec::new(),
            responses,
            patterns: Vec::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn with_patterns(mut self, patterns: Vec<String>) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn matches(&self, label: &str) -> bool {
        self.tag == label || self.aliases.iter().any(|alias| alias == label)
    }
}

/// Either a single label or a list of labels. Catalog files in the wild use both
/// shapes for `qtype`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl Default for OneOrMany {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }
}

/// Persisted shape of a single intent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawIntent {
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub qtype: OneOrMany,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub responses: Vec<String>,
}

/// Persisted shape of the whole catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub classes: Option<Vec<String>>,
    pub intents: Vec<RawIntent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub tag: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Matched {
        tag: String,
        score: f32,
        pool_size: usize,
    },
    NoConfidentIntent,
    UnknownTag {
        tag: String,
        score: f32,
    },
}

impl DispatchOutcome {
    pub fn is_fallback(&self) -> bool {
        !matches!(self, Self::Matched { .. })
    }

    pub fn matched_tag(&self) -> Option<&str> {
        match self {
            Self::Matched { tag, .. } => Some(tag.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatInput {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply_text: String,
    pub intent: Option<String>,
    pub outcome: DispatchOutcome,
    pub candidates: Vec<ScoredCandidate>,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogStats {
    pub intents: usize,
    pub labels: usize,
    pub responses: usize,
    pub unresolved_labels: Vec<String>,
}
