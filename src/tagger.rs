//! Classification of fused boxes into pickable and non-pickable objects.

use std::collections::BTreeSet;

use crate::detect::{LabelTable, SourceId, SourceRole, DEBRIS_CLASSES};
use crate::error::LookupError;
use crate::fusion::FusedBox;

/// Class names worth picking when the trusted detector reports them.
/// Loaded once at startup and read-only afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PickCategory {
    classes: BTreeSet<String>,
}

impl PickCategory {
    pub fn new<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            classes: classes.into_iter().map(Into::into).collect(),
        }
    }

    /// Names are matched exactly, case included (`Mask` is not `mask`).
    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains(name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl Default for PickCategory {
    fn default() -> Self {
        Self::new(DEBRIS_CLASSES)
    }
}

/// A source's vocabulary as the tagger sees it.
#[derive(Clone, Copy, Debug)]
pub struct Vocabulary<'a> {
    pub name: &'a str,
    pub role: SourceRole,
    pub labels: &'a LabelTable,
}

/// Semantic classification of one fused box.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    pub class_name: String,
    /// Source whose vocabulary named the box.
    pub source: SourceId,
    pub from_trusted: bool,
    /// Trusted source named it and the name is in the pick category.
    pub is_pickable: bool,
}

#[derive(Clone, Debug, Default)]
pub struct Tagger {
    picks: PickCategory,
}

impl Tagger {
    pub fn new(picks: PickCategory) -> Self {
        Self { picks }
    }

    /// Name a fused box.
    ///
    /// The trusted source's contribution wins when it has one; otherwise the
    /// label of the highest-scoring member is used, in its own vocabulary.
    /// `vocabularies` is indexed by source id.
    pub fn tag(&self, fused: &FusedBox, vocabularies: &[Vocabulary<'_>]) -> Result<Tag, LookupError> {
        let trusted = fused.contributions.iter().find(|c| {
            vocabularies
                .get(c.source)
                .is_some_and(|v| v.role == SourceRole::Trusted)
        });
        let (source, label) = match trusted {
            Some(c) => (c.source, c.label),
            None => match fused.contribution_from(fused.label_source) {
                Some(c) => (c.source, c.label),
                None => {
                    let c = fused
                        .contributions
                        .first()
                        .ok_or(LookupError::NoContributions)?;
                    (c.source, c.label)
                }
            },
        };

        let vocabulary = vocabularies.get(source).ok_or(LookupError::UnknownLabel {
            source_name: format!("#{}", source),
            label,
        })?;
        let class_name = vocabulary
            .labels
            .name(label)
            .ok_or_else(|| LookupError::UnknownLabel {
                source_name: vocabulary.name.to_string(),
                label,
            })?;

        let from_trusted = vocabulary.role == SourceRole::Trusted;
        Ok(Tag {
            class_name: class_name.to_string(),
            source,
            from_trusted,
            is_pickable: from_trusted && self.picks.contains(class_name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;
    use crate::fusion::SourceContribution;

    fn fused(contributions: Vec<SourceContribution>, label_source: SourceId) -> FusedBox {
        let label = contributions
            .iter()
            .find(|c| c.source == label_source)
            .map(|c| c.label)
            .unwrap_or(0);
        FusedBox {
            bbox: BoundingBox::new(0.1, 0.1, 0.2, 0.2),
            score: 0.8,
            label,
            label_source,
            members: contributions.len(),
            contributions,
        }
    }

    fn contribution(source: SourceId, label: u32, score: f32) -> SourceContribution {
        SourceContribution {
            source,
            label,
            score,
        }
    }

    struct Tables {
        coco: LabelTable,
        debris: LabelTable,
    }

    impl Tables {
        fn new() -> Self {
            Self {
                coco: LabelTable::coco(),
                debris: LabelTable::debris(),
            }
        }

        fn vocabularies(&self) -> Vec<Vocabulary<'_>> {
            vec![
                Vocabulary {
                    name: "general",
                    role: SourceRole::General,
                    labels: &self.coco,
                },
                Vocabulary {
                    name: "trusted",
                    role: SourceRole::Trusted,
                    labels: &self.debris,
                },
            ]
        }
    }

    #[test]
    fn trusted_contribution_wins_even_when_not_top_scoring() {
        let tables = Tables::new();
        // general says "bottle" at 0.9, trusted says "pbottle" at 0.6
        let fused = fused(vec![contribution(0, 39, 0.9), contribution(1, 10, 0.6)], 0);
        let tag = Tagger::default()
            .tag(&fused, &tables.vocabularies())
            .unwrap();
        assert_eq!(tag.class_name, "pbottle");
        assert_eq!(tag.source, 1);
        assert!(tag.from_trusted);
        assert!(tag.is_pickable);
    }

    #[test]
    fn general_only_box_is_never_pickable() {
        let tables = Tables::new();
        let fused = fused(vec![contribution(0, 0, 0.9)], 0);
        let tag = Tagger::default()
            .tag(&fused, &tables.vocabularies())
            .unwrap();
        assert_eq!(tag.class_name, "person");
        assert!(!tag.from_trusted);
        assert!(!tag.is_pickable);
    }

    #[test]
    fn trusted_class_outside_pick_category_is_not_pickable() {
        let tables = Tables::new();
        let tagger = Tagger::new(PickCategory::new(["can"]));
        let fused = fused(vec![contribution(1, 14, 0.7)], 1);
        let tag = tagger.tag(&fused, &tables.vocabularies()).unwrap();
        assert_eq!(tag.class_name, "tire");
        assert!(tag.from_trusted);
        assert!(!tag.is_pickable);
    }

    #[test]
    fn unknown_label_is_a_lookup_error() {
        let tables = Tables::new();
        let fused = fused(vec![contribution(1, 99, 0.7)], 1);
        let err = Tagger::default()
            .tag(&fused, &tables.vocabularies())
            .unwrap_err();
        assert_eq!(
            err,
            LookupError::UnknownLabel {
                source_name: "trusted".to_string(),
                label: 99
            }
        );
    }

    #[test]
    fn empty_contributions_are_rejected() {
        let tables = Tables::new();
        let fused = fused(Vec::new(), 0);
        assert_eq!(
            Tagger::default().tag(&fused, &tables.vocabularies()),
            Err(LookupError::NoContributions)
        );
    }

    #[test]
    fn default_pick_category_matches_debris_classes() {
        let picks = PickCategory::default();
        assert_eq!(picks.len(), 15);
        assert!(picks.contains("Mask"));
        assert!(!picks.contains("mask"));
        assert!(!picks.contains("person"));
    }
}
