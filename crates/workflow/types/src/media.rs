//! Media item value objects.
//!
//! The engine treats a media item as opaque: handlers may read its elements
//! and replace the whole object through their result, nothing else. Flavors
//! follow the `type/subtype` convention (`presenter/source`), with `*`
//! matching any part.

use crate::{WorkflowError, WorkflowResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Stable identifier of a media item
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaItemId(pub String);

impl MediaItemId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for MediaItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The broad classes of elements a media item carries
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Track,
    Attachment,
    Catalog,
}

// ── Flavor ───────────────────────────────────────────────────────────

/// A `type/subtype` label classifying a media element
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Flavor {
    pub kind: String,
    pub subtype: String,
}

impl Flavor {
    pub fn new(kind: impl Into<String>, subtype: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            subtype: subtype.into(),
        }
    }

    /// Parse a `type/subtype` string
    pub fn parse(s: &str) -> WorkflowResult<Self> {
        match s.split_once('/') {
            Some((kind, subtype)) => {
                let kind = kind.trim();
                let subtype = subtype.trim();
                if kind.is_empty() || subtype.is_empty() || subtype.contains('/') {
                    return Err(WorkflowError::InvalidFlavor(s.to_string()));
                }
                Ok(Self::new(kind, subtype))
            }
            None => Err(WorkflowError::InvalidFlavor(s.to_string())),
        }
    }

    /// Match against another flavor, honoring `*` wildcards on either side
    pub fn matches(&self, other: &Flavor) -> bool {
        (self.kind == "*" || other.kind == "*" || self.kind == other.kind)
            && (self.subtype == "*" || other.subtype == "*" || self.subtype == other.subtype)
    }
}

impl FromStr for Flavor {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for Flavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.subtype)
    }
}

// ── Elements ─────────────────────────────────────────────────────────

/// One typed element of a media item
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MediaElement {
    pub id: String,
    pub kind: ElementKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavor: Option<Flavor>,
    pub uri: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl MediaElement {
    pub fn new(kind: ElementKind, uri: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            flavor: None,
            uri: uri.into(),
            tags: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_flavor(mut self, flavor: Flavor) -> Self {
        self.flavor = Some(flavor);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

// ── Media Item ───────────────────────────────────────────────────────

/// Opaque value object processed by a workflow instance
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: MediaItemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<MediaElement>,
}

impl MediaItem {
    pub fn new(id: MediaItemId) -> Self {
        Self {
            id,
            title: None,
            elements: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_element(mut self, element: MediaElement) -> Self {
        self.elements.push(element);
        self
    }

    pub fn add_element(&mut self, element: MediaElement) {
        self.elements.push(element);
    }

    pub fn elements_by_flavor(&self, flavor: &Flavor) -> Vec<&MediaElement> {
        self.elements
            .iter()
            .filter(|e| e.flavor.as_ref().is_some_and(|f| f.matches(flavor)))
            .collect()
    }

    pub fn elements_of_kind(&self, kind: ElementKind) -> Vec<&MediaElement> {
        self.elements.iter().filter(|e| e.kind == kind).collect()
    }

    pub fn tracks(&self) -> Vec<&MediaElement> {
        self.elements_of_kind(ElementKind::Track)
    }

    pub fn catalogs(&self) -> Vec<&MediaElement> {
        self.elements_of_kind(ElementKind::Catalog)
    }

    pub fn attachments(&self) -> Vec<&MediaElement> {
        self.elements_of_kind(ElementKind::Attachment)
    }
}
