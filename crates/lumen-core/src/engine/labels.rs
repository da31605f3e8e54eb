//! Tag vocabulary (`selected_tags.csv`) and threshold-based tag selection.

use std::path::Path;

use crate::error::{EngineError, EngineResult};
use crate::types::Thresholds;

use super::{TagScores, TaggerOutput};

/// `category` value of rating labels (general, sensitive, ...).
pub const CATEGORY_RATING: u32 = 9;
/// `category` value of open-vocabulary descriptive tags.
pub const CATEGORY_GENERAL: u32 = 0;
/// `category` value of named characters.
pub const CATEGORY_CHARACTER: u32 = 4;

/// Floor applied to the character threshold when mcut is enabled.
const CHARACTER_MCUT_FLOOR: f32 = 0.15;

/// Tags whose underscores are part of the emoticon and must be kept.
const KAOMOJIS: &[&str] = &[
    "0_0", "(o)_(o)", "+_+", "+_-", "._.", "<o>_<o>", "<|>_<|>", "=_=", ">_<", "3_3", "6_9",
    ">_o", "@_@", "^_^", "o_o", "u_u", "x_x", "|_|", "||_||",
];

/// Model output labels, grouped by category.
///
/// Indexes refer to positions in the model's output vector, which follows
/// the row order of `selected_tags.csv`.
#[derive(Debug, Clone)]
pub struct LabelSet {
    names: Vec<String>,
    rating: Vec<usize>,
    general: Vec<usize>,
    character: Vec<usize>,
}

impl LabelSet {
    /// Read and parse a `selected_tags.csv` file.
    pub fn load(path: &Path) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::NotLoaded(format!("Cannot read tag list {}: {e}", path.display()))
        })?;
        Self::parse(&content).map_err(|message| {
            EngineError::NotLoaded(format!("Invalid tag list {}: {message}", path.display()))
        })
    }

    /// Parse CSV content with the columns `tag_id,name,category,count`.
    ///
    /// Names may themselves contain commas, so the name is everything between
    /// the first comma and the second-to-last one.
    pub fn parse(content: &str) -> Result<Self, String> {
        let mut set = Self {
            names: Vec::new(),
            rating: Vec::new(),
            general: Vec::new(),
            character: Vec::new(),
        };

        for (line_no, line) in content.lines().enumerate().skip(1) {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let (_, rest) = line
                .split_once(',')
                .ok_or_else(|| format!("line {}: missing columns", line_no + 1))?;
            let mut tail = rest.rsplitn(3, ',');
            let _count = tail.next();
            let category = tail
                .next()
                .ok_or_else(|| format!("line {}: missing category", line_no + 1))?;
            let name = tail
                .next()
                .ok_or_else(|| format!("line {}: missing name", line_no + 1))?;
            let category: u32 = category
                .trim()
                .parse()
                .map_err(|_| format!("line {}: bad category {category:?}", line_no + 1))?;

            let index = set.names.len();
            set.names.push(display_name(unquote(name)));
            match category {
                CATEGORY_RATING => set.rating.push(index),
                CATEGORY_GENERAL => set.general.push(index),
                CATEGORY_CHARACTER => set.character.push(index),
                _ => {}
            }
        }

        if set.names.is_empty() {
            return Err("no tags".to_string());
        }
        Ok(set)
    }

    /// Number of labels, which must equal the model's output width.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Split a probability vector into ratings, general and character tags.
    ///
    /// A tag is kept when its probability is strictly above the category's
    /// threshold. Kept tags are ordered by descending probability.
    pub fn select(&self, probs: &[f32], thresholds: &Thresholds) -> TaggerOutput {
        let pick = |indexes: &[usize]| -> TagScores {
            indexes
                .iter()
                .filter_map(|&i| probs.get(i).map(|&p| (self.names[i].clone(), p)))
                .collect()
        };

        let ratings = pick(&self.rating);
        let general_raw = pick(&self.general);
        let character_all = pick(&self.character);

        let general_threshold = if thresholds.general_mcut {
            mcut_threshold(general_raw.iter().map(|(_, p)| *p).collect())
        } else {
            thresholds.general
        };
        let character_threshold = if thresholds.character_mcut {
            mcut_threshold(character_all.iter().map(|(_, p)| *p).collect())
                .max(CHARACTER_MCUT_FLOOR)
        } else {
            thresholds.character
        };

        TaggerOutput {
            general: above(&general_raw, general_threshold),
            character: above(&character_all, character_threshold),
            ratings,
            general_raw,
        }
    }
}

fn above(scores: &[(String, f32)], threshold: f32) -> TagScores {
    let mut kept: TagScores = scores
        .iter()
        .filter(|(_, p)| *p > threshold)
        .cloned()
        .collect();
    kept.sort_by(|a, b| b.1.total_cmp(&a.1));
    kept
}

/// Maximum-cut threshold: the midpoint of the widest gap between
/// consecutive probabilities when sorted in descending order.
///
/// With fewer than two probabilities there is no gap and `0.0` is returned.
pub fn mcut_threshold(mut probs: Vec<f32>) -> f32 {
    if probs.len() < 2 {
        return 0.0;
    }
    probs.sort_by(|a, b| b.total_cmp(a));

    let mut best = 0;
    let mut best_gap = f32::NEG_INFINITY;
    for (i, pair) in probs.windows(2).enumerate() {
        let gap = pair[0] - pair[1];
        if gap > best_gap {
            best_gap = gap;
            best = i;
        }
    }
    (probs[best] + probs[best + 1]) / 2.0
}

fn unquote(raw: &str) -> String {
    let raw = raw.trim();
    match raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
        Some(inner) => inner.replace("\"\"", "\""),
        None => raw.to_string(),
    }
}

fn display_name(name: String) -> String {
    if KAOMOJIS.contains(&name.as_str()) {
        name
    } else {
        name.replace('_', " ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "tag_id,name,category,count
9999999,general,9,807366
9999998,sensitive,9,3770085
470575,1girl,0,4225150
212816,long_hair,0,3008413
1300281,^_^,0,43000
100,\"hello, world\",0,12
200,hatsune_miku,4,98000
201,saber_(fate),4,40000
";

    fn thresholds() -> Thresholds {
        Thresholds {
            general: 0.5,
            character: 0.85,
            general_mcut: false,
            character_mcut: false,
        }
    }

    #[test]
    fn test_parse_categories() {
        let set = LabelSet::parse(CSV).unwrap();
        assert_eq!(set.len(), 8);
        assert_eq!(set.rating, vec![0, 1]);
        assert_eq!(set.general, vec![2, 3, 4, 5]);
        assert_eq!(set.character, vec![6, 7]);
    }

    #[test]
    fn test_names_are_normalized() {
        let set = LabelSet::parse(CSV).unwrap();
        assert_eq!(set.names[3], "long hair");
        assert_eq!(set.names[4], "^_^");
        assert_eq!(set.names[5], "hello, world");
        assert_eq!(set.names[7], "saber (fate)");
    }

    #[test]
    fn test_parse_rejects_bad_category() {
        let err = LabelSet::parse("tag_id,name,category,count\n1,x,abc,3\n").unwrap_err();
        assert!(err.contains("bad category"));
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(LabelSet::parse("tag_id,name,category,count\n").is_err());
    }

    #[test]
    fn test_select_fixed_thresholds() {
        let set = LabelSet::parse(CSV).unwrap();
        let probs = [0.9, 0.1, 0.99, 0.4, 0.6, 0.5, 0.95, 0.2];
        let out = set.select(&probs, &thresholds());

        assert_eq!(out.ratings.len(), 2);
        assert_eq!(out.general_raw.len(), 4);
        assert_eq!(
            out.general,
            vec![("1girl".to_string(), 0.99), ("^_^".to_string(), 0.6)]
        );
        assert_eq!(out.character, vec![("hatsune miku".to_string(), 0.95)]);
    }

    #[test]
    fn test_select_character_mcut_floor() {
        let set = LabelSet::parse(CSV).unwrap();
        // Character probs 0.12 and 0.02: mcut alone would be 0.07.
        let probs = [0.5, 0.5, 0.1, 0.1, 0.1, 0.1, 0.12, 0.02];
        let mut t = thresholds();
        t.character_mcut = true;
        let out = set.select(&probs, &t);
        assert!(out.character.is_empty());
    }

    #[test]
    fn test_select_general_mcut() {
        let set = LabelSet::parse(CSV).unwrap();
        // General probs 0.9, 0.85, 0.2, 0.1: widest gap is 0.85 -> 0.2.
        let probs = [0.0, 0.0, 0.9, 0.85, 0.2, 0.1, 0.0, 0.0];
        let mut t = thresholds();
        t.general = 0.99;
        t.general_mcut = true;
        let out = set.select(&probs, &t);
        let names: Vec<&str> = out.general.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["1girl", "long hair"]);
    }

    #[test]
    fn test_mcut_threshold() {
        let t = mcut_threshold(vec![0.1, 0.9, 0.8, 0.2]);
        assert!((t - 0.5).abs() < 1e-6);
        assert_eq!(mcut_threshold(vec![0.7]), 0.0);
        assert_eq!(mcut_threshold(vec![]), 0.0);
    }
}
