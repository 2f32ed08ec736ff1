use serde::{Deserialize, Serialize};
use std::fmt;

/// The four word groups of an IAT: two concepts and two attribute polarities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    ConceptA,
    ConceptB,
    AttributePositive,
    AttributeNegative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryKind {
    Concept,
    Attribute,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::ConceptA,
        Category::ConceptB,
        Category::AttributePositive,
        Category::AttributeNegative,
    ];

    pub fn kind(&self) -> CategoryKind {
        match self {
            Category::ConceptA | Category::ConceptB => CategoryKind::Concept,
            Category::AttributePositive | Category::AttributeNegative => CategoryKind::Attribute,
        }
    }

    /// Stable identifier used in exports and on disk.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::ConceptA => "concept_a",
            Category::ConceptB => "concept_b",
            Category::AttributePositive => "attribute_positive",
            Category::AttributeNegative => "attribute_negative",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical response key. Physical bindings belong to the presenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSide {
    Left,
    Right,
}

impl ResponseSide {
    pub fn opposite(&self) -> Self {
        match self {
            ResponseSide::Left => ResponseSide::Right,
            ResponseSide::Right => ResponseSide::Left,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSide::Left => "left",
            ResponseSide::Right => "right",
        }
    }
}

impl fmt::Display for ResponseSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StimulusWord {
    pub text: String,
    pub category: Category,
}

impl StimulusWord {
    pub fn new(text: impl Into<String>, category: Category) -> Self {
        Self {
            text: text.into(),
            category,
        }
    }
}
