//! Closed vocabularies used by the catalogue: content kinds, scopes and sort modes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the five content collections exposed by the site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Blogs,
    Projects,
    Events,
    Roadmaps,
    Team,
}

impl ItemKind {
    /// Concatenation order used whenever every collection is queried.
    pub const ALL: [ItemKind; 5] = [
        ItemKind::Blogs,
        ItemKind::Projects,
        ItemKind::Events,
        ItemKind::Roadmaps,
        ItemKind::Team,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Blogs => "blogs",
            ItemKind::Projects => "projects",
            ItemKind::Events => "events",
            ItemKind::Roadmaps => "roadmaps",
            ItemKind::Team => "team",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
    }

    /// Team members are listed by ascending rank; everything else newest first.
    pub fn ranks_ascending(self) -> bool {
        matches!(self, ItemKind::Team)
    }

    /// Singular label used in error messages and logs.
    pub fn entity_label(self) -> &'static str {
        match self {
            ItemKind::Blogs => "blog post",
            ItemKind::Projects => "project",
            ItemKind::Events => "event",
            ItemKind::Roadmaps => "roadmap",
            ItemKind::Team => "team member",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Either every collection or a single one. Unknown values fall back to `All`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ItemScope {
    #[default]
    All,
    Only(ItemKind),
}

impl ItemScope {
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some(raw) => ItemKind::parse(raw).map_or(ItemScope::All, ItemScope::Only),
            None => ItemScope::All,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemScope::All => "all",
            ItemScope::Only(kind) => kind.as_str(),
        }
    }

    pub fn kinds(self) -> Vec<ItemKind> {
        match self {
            ItemScope::All => ItemKind::ALL.to_vec(),
            ItemScope::Only(kind) => vec![kind],
        }
    }

    /// Collapse `All` onto `fallback`, leaving a concrete kind untouched.
    pub fn kind_or(self, fallback: ItemKind) -> ItemKind {
        match self {
            ItemScope::All => fallback,
            ItemScope::Only(kind) => kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    Recent,
    Popular,
}

impl SortMode {
    pub fn from_query(value: Option<&str>) -> Self {
        match value.map(|raw| raw.trim().to_ascii_lowercase()) {
            Some(raw) if raw == "popular" => SortMode::Popular,
            _ => SortMode::Recent,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortMode::Recent => "recent",
            SortMode::Popular => "popular",
        }
    }
}

/// Which text columns a substring search inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchDepth {
    /// Headline fields only, used by listings.
    Summary,
    /// Headline plus body, author and skill fields, used by global search.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventMode {
    #[default]
    Physical,
    Virtual,
    Hybrid,
}

impl EventMode {
    pub fn as_str(self) -> &'static str {
        match self {
            EventMode::Physical => "physical",
            EventMode::Virtual => "virtual",
            EventMode::Hybrid => "hybrid",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "physical" => Some(EventMode::Physical),
            "virtual" => Some(EventMode::Virtual),
            "hybrid" => Some(EventMode::Hybrid),
            _ => None,
        }
    }
}
