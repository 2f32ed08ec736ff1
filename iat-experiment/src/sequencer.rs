//! Count-exact, randomized trial lists for one block.
//!
//! Randomness is always injected so callers can substitute a seeded
//! generator; the production engine passes its own `rand::rng()`.

use crate::catalog::StimulusCatalog;
use iat_core::{BlockSpec, Category, ConfigurationError, ResponseSide, SamplingRule, StimulusWord, TrialSpec};
use rand::Rng;
use rand::seq::{SliceRandom, index};

/// Uniform in-place permutation (Fisher-Yates).
pub fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    items.shuffle(rng);
}

/// `k` distinct elements drawn uniformly, in draw order.
///
/// Panics if `k > items.len()`; [`check_block`] rules that out before any draw.
pub fn sample_without_replacement<T: Clone, R: Rng + ?Sized>(
    items: &[T],
    k: usize,
    rng: &mut R,
) -> Vec<T> {
    index::sample(rng, items.len(), k)
        .into_iter()
        .map(|i| items[i].clone())
        .collect()
}

/// Verifies that `block` can be satisfied by `catalog` and returns the number
/// of trials its sampling rule produces.
pub fn check_block(block: &BlockSpec, catalog: &StimulusCatalog) -> Result<usize, ConfigurationError> {
    block.validate_sides()?;

    let mut pool = 0;
    for category in block.categories() {
        let available = catalog.count(category);
        if available == 0 {
            return Err(ConfigurationError::InsufficientWords {
                block: block.id,
                category,
                needed: 1,
                available,
            });
        }
        pool += available;
    }

    let produced = match block.sampling {
        SamplingRule::FullSingle => pool,
        SamplingRule::DoubledFull => pool * 2,
        SamplingRule::StratifiedSubset { per_category } => {
            if per_category == 0 {
                return Err(ConfigurationError::EmptySample { block: block.id });
            }
            for category in block.categories() {
                let available = catalog.count(category);
                if available < per_category {
                    return Err(ConfigurationError::InsufficientWords {
                        block: block.id,
                        category,
                        needed: per_category,
                        available,
                    });
                }
            }
            per_category * block.categories().count()
        }
    };

    if produced != block.trial_count {
        return Err(ConfigurationError::TrialCountMismatch {
            block: block.id,
            rule: block.sampling,
            declared: block.trial_count,
            produced,
        });
    }
    Ok(produced)
}

/// Builds the shuffled trial list for one instantiation of `block`.
pub fn generate_trials<R: Rng + ?Sized>(
    block: &BlockSpec,
    catalog: &StimulusCatalog,
    rng: &mut R,
) -> Result<Vec<TrialSpec>, ConfigurationError> {
    check_block(block, catalog)?;

    let mut words: Vec<&StimulusWord> = Vec::with_capacity(block.trial_count);
    match block.sampling {
        SamplingRule::FullSingle => {
            for category in block.categories() {
                words.extend(catalog.words_in(category));
            }
        }
        SamplingRule::DoubledFull => {
            for category in block.categories() {
                words.extend(catalog.words_in(category));
            }
            words.extend_from_within(..);
        }
        SamplingRule::StratifiedSubset { per_category } => {
            for category in block.categories() {
                let pool: Vec<&StimulusWord> = catalog.words_in(category).collect();
                words.extend(sample_without_replacement(&pool, per_category, rng));
            }
        }
    }

    shuffle(&mut words, rng);

    let mut trials = Vec::with_capacity(words.len());
    for (i, word) in words.into_iter().enumerate() {
        trials.push(TrialSpec {
            word: word.text.clone(),
            category: word.category,
            correct_response: side_for(block, word.category)?,
            sequence_index: i + 1,
        });
    }

    tracing::debug!(block = block.id, trials = trials.len(), "generated trial list");
    Ok(trials)
}

fn side_for(block: &BlockSpec, category: Category) -> Result<ResponseSide, ConfigurationError> {
    block
        .side_of(category)
        .ok_or(ConfigurationError::UnassignedCategory {
            block: block.id,
            category,
        })
}
