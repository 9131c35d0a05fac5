use serde::{Deserialize, Serialize};

use crate::Category;

/// Which display figures a detection gets.
///
/// Pipelines know their category up front and pick the matching variant. `Generic`
/// is for callers that don't: it falls back to reading the class label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Semantics {
    Room,
    Wall,
    Opening,
    Generic,
}

impl Semantics {
    pub fn for_category(category: Category) -> Self {
        match category {
            Category::Room => Semantics::Room,
            Category::Wall => Semantics::Wall,
            Category::Opening => Semantics::Opening,
        }
    }

    /// Resolves `Generic` from the label; `Generic` stays when nothing matches.
    pub fn resolve(self, label: &str) -> Self {
        if self != Semantics::Generic {
            return self;
        }
        let l = label.to_ascii_lowercase();
        if l.contains("room") {
            Semantics::Room
        } else if l.contains("wall") {
            Semantics::Wall
        } else if l == "door" || l == "window" {
            Semantics::Opening
        } else {
            Semantics::Generic
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WallKind {
    Interior,
    Exterior,
}

// First match wins; exterior keys come first so "exterior_internal_wall" is exterior.
const WALL_LABELS: &[(&str, WallKind)] = &[
    ("exterior", WallKind::Exterior),
    ("external", WallKind::Exterior),
    ("interior", WallKind::Interior),
    ("internal", WallKind::Interior),
];

impl WallKind {
    pub fn from_label(label: &str) -> Self {
        let l = label.to_ascii_lowercase();
        WALL_LABELS
            .iter()
            .find(|(key, _)| l.contains(key))
            .map(|(_, kind)| *kind)
            .unwrap_or(WallKind::Interior)
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            WallKind::Interior => "interior_wall",
            WallKind::Exterior => "exterior_wall",
        }
    }
}
