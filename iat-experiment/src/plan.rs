use crate::catalog::StimulusCatalog;
use crate::sequencer;
use iat_core::{BlockId, BlockSpec, Category, ConfigurationError, SamplingRule};

use Category::{AttributeNegative as Negative, AttributePositive as Positive, ConceptA, ConceptB};

/// Ordered, immutable sequence of blocks administered in every session.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockPlan {
    blocks: Vec<BlockSpec>,
}

impl BlockPlan {
    pub fn new(blocks: Vec<BlockSpec>) -> Result<Self, ConfigurationError> {
        if blocks.is_empty() {
            return Err(ConfigurationError::EmptyPlan);
        }
        for (i, block) in blocks.iter().enumerate() {
            if blocks[..i].iter().any(|b| b.id == block.id) {
                return Err(ConfigurationError::DuplicateBlockId { id: block.id });
            }
            block.validate_sides()?;
        }
        Ok(Self { blocks })
    }

    /// The seven-block hometown IAT: blocks 4 and 7 are the scored test blocks,
    /// block 5 reverses the concept keys with every concept word shown twice.
    pub fn standard() -> Self {
        let blocks = vec![
            block(
                1,
                "Block 1 - 概念词辨别练习",
                "请将\"河北\"相关城市按 E 键，\"外省\"相关城市按 I 键",
                &[ConceptA],
                &[ConceptB],
                20,
                SamplingRule::FullSingle,
                true,
                false,
            ),
            block(
                2,
                "Block 2 - 属性词辨别练习",
                "请将\"积极\"词汇按 E 键，\"消极\"词汇按 I 键",
                &[Positive],
                &[Negative],
                20,
                SamplingRule::FullSingle,
                true,
                false,
            ),
            block(
                3,
                "Block 3 - 联合练习",
                "请将\"河北\"或\"积极\"词汇按 E 键，\"外省\"或\"消极\"词汇按 I 键",
                &[ConceptA, Positive],
                &[ConceptB, Negative],
                20,
                SamplingRule::StratifiedSubset { per_category: 5 },
                true,
                false,
            ),
            block(
                4,
                "Block 4 - 联合测试 (正式)",
                "请将\"河北\"或\"积极\"词汇按 E 键，\"外省\"或\"消极\"词汇按 I 键",
                &[ConceptA, Positive],
                &[ConceptB, Negative],
                40,
                SamplingRule::FullSingle,
                false,
                false,
            ),
            block(
                5,
                "Block 5 - 概念词反转练习",
                "注意位置变化！请将\"外省\"相关城市按 E 键，\"河北\"相关城市按 I 键",
                &[ConceptB],
                &[ConceptA],
                40,
                SamplingRule::DoubledFull,
                true,
                true,
            ),
            block(
                6,
                "Block 6 - 反转联合练习",
                "请将\"外省\"或\"积极\"词汇按 E 键，\"河北\"或\"消极\"词汇按 I 键",
                &[ConceptB, Positive],
                &[ConceptA, Negative],
                20,
                SamplingRule::StratifiedSubset { per_category: 5 },
                true,
                true,
            ),
            block(
                7,
                "Block 7 - 反转联合测试 (正式)",
                "请将\"外省\"或\"积极\"词汇按 E 键，\"河北\"或\"消极\"词汇按 I 键",
                &[ConceptB, Positive],
                &[ConceptA, Negative],
                40,
                SamplingRule::FullSingle,
                false,
                true,
            ),
        ];
        Self { blocks }
    }

    /// Checks every block's sampling arithmetic against the catalog without
    /// drawing any trials.
    pub fn validate(&self, catalog: &StimulusCatalog) -> Result<(), ConfigurationError> {
        for block in &self.blocks {
            sequencer::check_block(block, catalog)?;
        }
        Ok(())
    }

    pub fn blocks(&self) -> &[BlockSpec] {
        &self.blocks
    }

    pub fn get(&self, index: usize) -> Option<&BlockSpec> {
        self.blocks.get(index)
    }

    pub fn by_id(&self, id: BlockId) -> Option<&BlockSpec> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn total_trials(&self) -> usize {
        self.blocks.iter().map(|b| b.trial_count).sum()
    }
}

impl Default for BlockPlan {
    fn default() -> Self {
        Self::standard()
    }
}

#[allow(clippy::too_many_arguments)]
fn block(
    id: BlockId,
    name: &str,
    instruction: &str,
    left: &[Category],
    right: &[Category],
    trial_count: usize,
    sampling: SamplingRule,
    is_practice: bool,
    is_reversed: bool,
) -> BlockSpec {
    BlockSpec {
        id,
        name: name.to_string(),
        instruction: instruction.to_string(),
        left: left.to_vec(),
        right: right.to_vec(),
        trial_count,
        sampling,
        is_practice,
        is_reversed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_plan_is_consistent_with_catalog() {
        let plan = BlockPlan::standard();
        plan.validate(&StimulusCatalog::standard()).unwrap();
        let counts: Vec<usize> = plan.blocks().iter().map(|b| b.trial_count).collect();
        assert_eq!(counts, vec![20, 20, 20, 40, 40, 20, 40]);
        assert_eq!(plan.total_trials(), 200);
    }

    #[test]
    fn test_blocks_are_four_and_seven() {
        let plan = BlockPlan::standard();
        let tests: Vec<BlockId> = plan
            .blocks()
            .iter()
            .filter(|b| !b.is_practice)
            .map(|b| b.id)
            .collect();
        assert_eq!(tests, vec![4, 7]);
    }

    #[test]
    fn reversed_blocks_swap_concepts_only() {
        let plan = BlockPlan::standard();
        let compatible = plan.by_id(4).unwrap();
        let incompatible = plan.by_id(7).unwrap();
        for category in [ConceptA, ConceptB] {
            assert_eq!(
                compatible.side_of(category).map(|s| s.opposite()),
                incompatible.side_of(category)
            );
        }
        for category in [Positive, Negative] {
            assert_eq!(compatible.side_of(category), incompatible.side_of(category));
        }
    }

    #[test]
    fn block_texts_match_the_stimulus_language() {
        let catalog = StimulusCatalog::standard();
        for block in BlockPlan::standard().blocks() {
            assert!(block.name.starts_with(&format!("Block {} - ", block.id)));
            let title = block.name.trim_start_matches(|c: char| c.is_ascii());
            assert!(!title.is_empty(), "{}", block.name);
            assert!(block.instruction.contains("按 E 键") && block.instruction.contains("按 I 键"));
        }
        assert!(catalog.label(ConceptA).starts_with("河北"));
        assert!(BlockPlan::standard().by_id(5).unwrap().instruction.starts_with("注意位置变化"));
    }

    #[test]
    fn duplicate_ids_and_empty_plans_are_rejected() {
        assert_eq!(BlockPlan::new(Vec::new()), Err(ConfigurationError::EmptyPlan));
        let first = BlockPlan::standard().blocks()[0].clone();
        assert_eq!(
            BlockPlan::new(vec![first.clone(), first]),
            Err(ConfigurationError::DuplicateBlockId { id: 1 })
        );
    }

    #[test]
    fn validate_catches_undersized_catalog() {
        let catalog = StimulusCatalog::new(
            StimulusCatalog::standard().words()[..35].to_vec(),
            Default::default(),
        );
        assert!(matches!(
            BlockPlan::standard().validate(&catalog),
            Err(ConfigurationError::TrialCountMismatch { block: 2, .. })
        ));
    }
}
