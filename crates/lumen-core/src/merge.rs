//! Merging and ranking of the engine's general and character tags.

use crate::types::{TagEntry, TagSource};

/// Flatten both tag mappings into one list ranked by confidence.
///
/// General tags are emitted first, then character tags, each in the order
/// the engine reported them. The sort is stable, so equal confidences keep
/// that insertion order. Names appearing in both mappings are kept twice.
pub fn merge(general: &[(String, f32)], character: &[(String, f32)]) -> Vec<TagEntry> {
    let mut labels = Vec::with_capacity(general.len() + character.len());

    labels.extend(
        general
            .iter()
            .map(|(name, confidence)| TagEntry::new(name.clone(), TagSource::General, *confidence)),
    );

    if !character.is_empty() {
        labels.extend(character.iter().map(|(name, confidence)| {
            TagEntry::new(name.clone(), TagSource::Character, *confidence)
        }));
    }

    // total_cmp keeps the order total even if a NaN slips through.
    labels.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(pairs: &[(&str, f32)]) -> Vec<(String, f32)> {
        pairs.iter().map(|(n, c)| (n.to_string(), *c)).collect()
    }

    #[test]
    fn test_general_only() {
        let labels = merge(&scores(&[("sky", 0.4), ("cat", 0.9)]), &[]);
        assert_eq!(
            labels,
            vec![
                TagEntry::new("cat", TagSource::General, 0.9),
                TagEntry::new("sky", TagSource::General, 0.4),
            ]
        );
        assert!(labels.iter().all(|l| l.priority == 0));
    }

    #[test]
    fn test_character_interleaves_by_confidence() {
        let labels = merge(
            &scores(&[("1girl", 0.98), ("solo", 0.7)]),
            &scores(&[("hatsune miku", 0.91)]),
        );
        let names: Vec<&str> = labels.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["1girl", "hatsune miku", "solo"]);
        assert_eq!(labels[1].source, TagSource::Character);
        assert_eq!(labels[1].priority, 1);
    }

    #[test]
    fn test_length_and_ordering() {
        let general = scores(&[("a", 0.1), ("b", 0.75), ("c", 0.33), ("d", 0.75), ("e", 1.0)]);
        let character = scores(&[("x", 0.5), ("y", 0.99), ("z", 0.0)]);
        let labels = merge(&general, &character);

        assert_eq!(labels.len(), general.len() + character.len());
        assert!(labels
            .windows(2)
            .all(|w| w[0].confidence >= w[1].confidence));
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let labels = merge(
            &scores(&[("g1", 0.8), ("g2", 0.8)]),
            &scores(&[("c1", 0.8), ("c2", 0.9)]),
        );
        let order: Vec<(&str, TagSource)> =
            labels.iter().map(|l| (l.name.as_str(), l.source)).collect();
        assert_eq!(
            order,
            [
                ("c2", TagSource::Character),
                ("g1", TagSource::General),
                ("g2", TagSource::General),
                ("c1", TagSource::Character),
            ]
        );
    }

    #[test]
    fn test_merge_is_deterministic() {
        let general = scores(&[("a", 0.5), ("b", 0.5), ("c", 0.2)]);
        let character = scores(&[("a", 0.5)]);
        assert_eq!(merge(&general, &character), merge(&general, &character));
    }

    #[test]
    fn test_duplicate_names_are_not_merged() {
        let labels = merge(&scores(&[("saber", 0.7)]), &scores(&[("saber", 0.95)]));
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].source, TagSource::Character);
        assert_eq!(labels[1].source, TagSource::General);
    }

    #[test]
    fn test_confidence_not_clamped() {
        let labels = merge(&scores(&[("odd", 1.25), ("neg", -0.1)]), &[]);
        assert_eq!(labels[0].confidence, 1.25);
        assert_eq!(labels[1].confidence, -0.1);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(merge(&[], &[]).is_empty());
    }
}
