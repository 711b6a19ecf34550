use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CategoryError {
    #[error("invalid category {0} (expected 0..=4)")]
    OutOfRange(u8),
}

/// Grade subjects. The numeric ids are part of the wire format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum Category {
    Language = 0,
    Mathematics = 1,
    Science = 2,
    History = 3,
    Physical = 4,
}

impl Category {
    pub const COUNT: usize = 5;
    pub const ALL: [Category; Category::COUNT] = [
        Category::Language,
        Category::Mathematics,
        Category::Science,
        Category::History,
        Category::Physical,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Category::Language => "Language",
            Category::Mathematics => "Mathematics",
            Category::Science => "Science",
            Category::History => "History",
            Category::Physical => "Physical",
        }
    }
}

impl TryFrom<u8> for Category {
    type Error = CategoryError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Category::ALL
            .get(value as usize)
            .copied()
            .ok_or(CategoryError::OutOfRange(value))
    }
}

impl From<Category> for u8 {
    fn from(category: Category) -> u8 {
        category.id()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_stable() {
        for (i, c) in Category::ALL.iter().enumerate() {
            assert_eq!(c.id() as usize, i);
            assert_eq!(Category::try_from(i as u8).unwrap(), *c);
        }
        assert_eq!(Category::Mathematics.name(), "Mathematics");
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(Category::try_from(5), Err(CategoryError::OutOfRange(5)));
        assert_eq!(Category::try_from(255), Err(CategoryError::OutOfRange(255)));
    }

    #[test]
    fn test_serde_rejects_unknown_id() {
        assert_eq!(serde_json::to_string(&Category::Science).unwrap(), "2");
        assert!(serde_json::from_str::<Category>("7").is_err());
    }
}
