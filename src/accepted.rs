//! 已接受的例句集合
//!
//! 生成成功的集合按生成顺序追加；用户勾选要导出的集合后交给打包流程。

use serde::Serialize;

use crate::models::SentenceSet;

/// 表格展示用的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentenceRow {
    pub sentence: String,
    pub translation: String,
    pub context: String,
}

#[derive(Debug, Default)]
pub struct AcceptedSets {
    sets: Vec<SentenceSet>,
    selected: Vec<bool>,
}

impl AcceptedSets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// 追加集合，默认不勾选；返回其序号
    pub fn push(&mut self, set: SentenceSet) -> usize {
        self.sets.push(set);
        self.selected.push(false);
        self.sets.len() - 1
    }

    pub fn extend<I: IntoIterator<Item = SentenceSet>>(&mut self, sets: I) {
        for set in sets {
            self.push(set);
        }
    }

    pub fn get(&self, index: usize) -> Option<&SentenceSet> {
        self.sets.get(index)
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selected.get(index).copied().unwrap_or(false)
    }

    /// 切换勾选状态；越界返回 None
    pub fn toggle(&mut self, index: usize) -> Option<bool> {
        let flag = self.selected.get_mut(index)?;
        *flag = !*flag;
        Some(*flag)
    }

    pub fn select(&mut self, index: usize) -> bool {
        self.set_selected(index, true)
    }

    pub fn deselect(&mut self, index: usize) -> bool {
        self.set_selected(index, false)
    }

    fn set_selected(&mut self, index: usize, value: bool) -> bool {
        match self.selected.get_mut(index) {
            Some(flag) => {
                *flag = value;
                true
            }
            None => false,
        }
    }

    pub fn select_all(&mut self) {
        self.selected.iter_mut().for_each(|f| *f = true);
    }

    pub fn clear(&mut self) {
        self.sets.clear();
        self.selected.clear();
    }

    /// 已勾选的集合，保持追加顺序
    pub fn selected(&self) -> Vec<&SentenceSet> {
        self.sets
            .iter()
            .zip(&self.selected)
            .filter(|(_, selected)| **selected)
            .map(|(set, _)| set)
            .collect()
    }

    /// 第 `index` 个集合的标题（从 1 开始编号）
    pub fn label(&self, index: usize) -> Option<String> {
        self.sets
            .get(index)
            .map(|set| format!("Set {} - Word/Phrase: {}", index + 1, set.word))
    }

    pub fn rows(&self, index: usize) -> Option<Vec<SentenceRow>> {
        self.sets.get(index).map(|set| {
            set.sentences
                .iter()
                .map(|s| SentenceRow {
                    sentence: s.sentence.clone(),
                    translation: s.translation.clone(),
                    context: s.context.clone(),
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures::{english_set, german_set};

    #[test]
    fn test_selection_keeps_insertion_order() {
        let mut accepted = AcceptedSets::new();
        accepted.push(german_set("laufen"));
        accepted.push(german_set("gehen"));
        accepted.push(german_set("essen"));

        assert!(accepted.selected().is_empty());
        assert_eq!(accepted.toggle(2), Some(true));
        assert!(accepted.select(0));
        let words: Vec<&str> = accepted.selected().iter().map(|s| s.word.as_str()).collect();
        assert_eq!(words, vec!["laufen", "essen"]);

        assert_eq!(accepted.toggle(2), Some(false));
        assert_eq!(accepted.selected().len(), 1);
        assert_eq!(accepted.toggle(9), None);
        assert!(!accepted.deselect(9));
    }

    #[test]
    fn test_select_all_and_clear() {
        let mut accepted = AcceptedSets::new();
        accepted.extend(vec![german_set("a"), english_set("b")]);
        accepted.select_all();
        assert_eq!(accepted.selected().len(), 2);
        accepted.clear();
        assert!(accepted.is_empty());
        assert!(accepted.selected().is_empty());
    }

    #[test]
    fn test_label_and_rows() {
        let mut accepted = AcceptedSets::new();
        accepted.push(english_set("run"));
        assert_eq!(accepted.label(0).unwrap(), "Set 1 - Word/Phrase: run");
        let rows = accepted.rows(0).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].sentence, "I run every morning in the park.");
        assert_eq!(rows[0].context, "Günlük rutin");
        assert!(accepted.label(1).is_none());
    }
}
