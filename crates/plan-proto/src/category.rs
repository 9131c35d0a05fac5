use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Room,
    Wall,
    Opening,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Room, Category::Wall, Category::Opening];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Room => "room",
            Category::Wall => "wall",
            Category::Opening => "opening",
        }
    }

    /// Maps a requested analysis type (as clients send them) onto a category.
    pub fn from_request_type(t: &str) -> Option<Self> {
        match t.trim().to_ascii_lowercase().as_str() {
            "room" | "rooms" | "floors" | "flooring" => Some(Category::Room),
            "wall" | "walls" => Some(Category::Wall),
            "opening" | "openings" | "door" | "doors" | "window" | "windows" | "columns" => {
                Some(Category::Opening)
            }
            _ => None,
        }
    }

    /// Resolves a request type list. An empty list means every category; unknown
    /// names are ignored, so a list of only unknown names selects nothing.
    pub fn from_request_types<S: AsRef<str>>(types: &[S]) -> Vec<Self> {
        if types.is_empty() {
            return Self::ALL.to_vec();
        }
        let mut out: Vec<Category> = types.iter().filter_map(|t| Self::from_request_type(t.as_ref())).collect();
        out.sort();
        out.dedup();
        out
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_types_map_onto_categories() {
        assert_eq!(Category::from_request_types(&["floors", "Doors", "rooms"]), vec![Category::Room, Category::Opening]);
        assert_eq!(Category::from_request_types(&["walls"]), vec![Category::Wall]);
        assert_eq!(Category::from_request_types::<&str>(&[]), Category::ALL.to_vec());
        assert!(Category::from_request_types(&["ceilings"]).is_empty());
        assert_eq!(Category::from_request_types(&["ceilings", "walls"]), vec![Category::Wall]);
    }
}
