use crate::error::ConfigurationError;
use crate::stimulus::{Category, ResponseSide};
use serde::{Deserialize, Serialize};

pub type BlockId = u8;

/// How a block draws its trial list from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "rule")]
pub enum SamplingRule {
    /// Every word of every referenced category exactly once.
    FullSingle,
    /// `per_category` words drawn without replacement from each referenced category.
    StratifiedSubset { per_category: usize },
    /// The full-single list twice over.
    DoubledFull,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSpec {
    pub id: BlockId,
    pub name: String,
    pub instruction: String,
    pub left: Vec<Category>,
    pub right: Vec<Category>,
    pub trial_count: usize,
    pub sampling: SamplingRule,
    pub is_practice: bool,
    pub is_reversed: bool,
}

impl BlockSpec {
    /// Response side a word of `category` maps to, or `None` if the block
    /// does not reference the category.
    pub fn side_of(&self, category: Category) -> Option<ResponseSide> {
        if self.left.contains(&category) {
            Some(ResponseSide::Left)
        } else if self.right.contains(&category) {
            Some(ResponseSide::Right)
        } else {
            None
        }
    }

    /// Referenced categories, left side first.
    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.left.iter().chain(self.right.iter()).copied()
    }

    pub fn validate_sides(&self) -> Result<(), ConfigurationError> {
        if self.left.is_empty() && self.right.is_empty() {
            return Err(ConfigurationError::NoCategories { block: self.id });
        }
        for (i, category) in self.left.iter().enumerate() {
            if self.right.contains(category) || self.left[..i].contains(category) {
                return Err(ConfigurationError::AmbiguousSide {
                    block: self.id,
                    category: *category,
                });
            }
        }
        for (i, category) in self.right.iter().enumerate() {
            if self.right[..i].contains(category) {
                return Err(ConfigurationError::AmbiguousSide {
                    block: self.id,
                    category: *category,
                });
            }
        }
        Ok(())
    }
}
