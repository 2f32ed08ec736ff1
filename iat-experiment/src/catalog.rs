use iat_core::{Category, StimulusWord};
use std::collections::BTreeMap;

const CONCEPT_A: [&str; 10] = ["保定", "唐山", "邯郸", "沧州", "邢台", "廊坊", "承德", "衡水", "定州", "正定"];
const CONCEPT_B: [&str; 10] = ["太原", "沈阳", "郑州", "济南", "西安", "合肥", "长春", "兰州", "银川", "西宁"];
const POSITIVE: [&str; 10] = ["快乐", "幸福", "美好", "成功", "优秀", "喜爱", "友善", "智慧", "真诚", "幸运"];
const NEGATIVE: [&str; 10] = ["痛苦", "悲伤", "丑陋", "失败", "糟糕", "厌恶", "冷漠", "愚蠢", "虚伪", "倒霉"];

/// Immutable word lists per category, built once and shared by every session.
#[derive(Debug, Clone, PartialEq)]
pub struct StimulusCatalog {
    words: Vec<StimulusWord>,
    labels: BTreeMap<Category, String>,
}

impl StimulusCatalog {
    pub fn new(words: Vec<StimulusWord>, labels: BTreeMap<Category, String>) -> Self {
        Self { words, labels }
    }

    /// Hometown (Hebei cities) vs. other provinces, with positive and negative
    /// attribute words. Ten words per category.
    pub fn standard() -> Self {
        let lists = [
            (Category::ConceptA, &CONCEPT_A, "河北 (家乡)"),
            (Category::ConceptB, &CONCEPT_B, "外省 (他乡)"),
            (Category::AttributePositive, &POSITIVE, "积极 (好)"),
            (Category::AttributeNegative, &NEGATIVE, "消极 (坏)"),
        ];

        let mut words = Vec::with_capacity(40);
        let mut labels = BTreeMap::new();
        for (category, list, label) in lists {
            words.extend(list.iter().map(|w| StimulusWord::new(*w, category)));
            labels.insert(category, label.to_string());
        }
        Self { words, labels }
    }

    pub fn words(&self) -> &[StimulusWord] {
        &self.words
    }

    pub fn words_in(&self, category: Category) -> impl Iterator<Item = &StimulusWord> + '_ {
        self.words.iter().filter(move |w| w.category == category)
    }

    pub fn count(&self, category: Category) -> usize {
        self.words_in(category).count()
    }

    /// Display label for a category, falling back to its stable id.
    pub fn label(&self, category: Category) -> &str {
        self.labels
            .get(&category)
            .map(String::as_str)
            .unwrap_or(category.as_str())
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl Default for StimulusCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
