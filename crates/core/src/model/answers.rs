use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::ids::QuestionId;
use crate::model::question::OptionLabel;

/// Selected option per question for one session.
///
/// Keys are unique; selecting again for the same question replaces the
/// previous choice. Iteration is ordered by question id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerMap(BTreeMap<QuestionId, OptionLabel>);

impl AnswerMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rehydrate from persisted `(question id, label)` string pairs.
    ///
    /// Entries whose id or label does not parse are dropped; a dropped entry
    /// scores the same as an unanswered question.
    pub fn from_raw<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let map = entries
            .into_iter()
            .filter_map(|(k, v)| {
                let id = k.as_ref().parse::<QuestionId>().ok()?;
                let label = v.as_ref().parse::<OptionLabel>().ok()?;
                Some((id, label))
            })
            .collect();
        Self(map)
    }

    /// Record a selection, returning the previous one if any.
    pub fn select(&mut self, question: QuestionId, label: OptionLabel) -> Option<OptionLabel> {
        self.0.insert(question, label)
    }

    #[must_use]
    pub fn get(&self, question: QuestionId) -> Option<OptionLabel> {
        self.0.get(&question).copied()
    }

    #[must_use]
    pub fn contains(&self, question: QuestionId) -> bool {
        self.0.contains_key(&question)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (QuestionId, OptionLabel)> + '_ {
        self.0.iter().map(|(id, label)| (*id, *label))
    }
}

impl FromIterator<(QuestionId, OptionLabel)> for AnswerMap {
    fn from_iter<T: IntoIterator<Item = (QuestionId, OptionLabel)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reselecting_overwrites_without_growing() {
        let mut answers = AnswerMap::new();
        assert_eq!(answers.select(QuestionId::new(1), OptionLabel::A), None);
        assert_eq!(
            answers.select(QuestionId::new(1), OptionLabel::C),
            Some(OptionLabel::A)
        );
        assert_eq!(answers.len(), 1);
        assert_eq!(answers.get(QuestionId::new(1)), Some(OptionLabel::C));
    }

    #[test]
    fn from_raw_drops_unparseable_entries() {
        let answers = AnswerMap::from_raw([("1", "a"), ("2", "X"), ("three", "B"), ("4", "D")]);
        assert_eq!(answers.len(), 2);
        assert_eq!(answers.get(QuestionId::new(1)), Some(OptionLabel::A));
        assert!(!answers.contains(QuestionId::new(2)));
        assert_eq!(answers.get(QuestionId::new(4)), Some(OptionLabel::D));
    }
}
