//! Keyword driven classification of the free-text education level.

use std::cmp::Reverse;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::models::Record;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelRule {
    pub label: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelVocabulary {
    pub rules: Vec<LevelRule>,
    pub unclassified: String,
    #[serde(default)]
    pub display_order: Vec<String>,
}

impl Default for LevelVocabulary {
    fn default() -> Self {
        fn rule(label: &str, keywords: &[&str]) -> LevelRule {
            LevelRule {
                label: label.to_string(),
                keywords: keywords.iter().map(|keyword| keyword.to_string()).collect(),
            }
        }

        Self {
            rules: vec![
                rule(
                    "SMK",
                    &[
                        "smk",
                        "smkn",
                        "smks",
                        "stm",
                        "smea",
                        "kejuruan",
                        "sekolah menengah kejuruan",
                        "vocational",
                    ],
                ),
                rule(
                    "SMA",
                    &[
                        "sma",
                        "sman",
                        "smas",
                        "ma",
                        "man",
                        "madrasah aliyah",
                        "sekolah menengah atas",
                        "high school",
                    ],
                ),
                rule(
                    "Universitas",
                    &[
                        "universitas",
                        "university",
                        "univ",
                        "institut",
                        "institute",
                        "politeknik",
                        "polytechnic",
                        "sekolah tinggi",
                        "akademi",
                        "stmik",
                        "stie",
                        "diploma",
                        "sarjana",
                        "mahasiswa",
                        "d3",
                        "d4",
                        "s1",
                        "s2",
                    ],
                ),
            ],
            unclassified: "Lainnya".to_string(),
            display_order: vec![
                "SMK".to_string(),
                "SMA".to_string(),
                "Universitas".to_string(),
                "Lainnya".to_string(),
            ],
        }
    }
}

impl LevelVocabulary {
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read vocabulary {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse vocabulary {}", path.display()))
    }

    /// Derived level of a record: the level text is matched first, then the
    /// institution text; failing both, the raw level itself is used.
    pub fn classify(&self, record: &Record) -> String {
        let level = record.level.as_deref().map(canonical_text).unwrap_or_default();
        if let Some(label) = self.match_text(&level) {
            return label.to_string();
        }

        let institution = record
            .institution
            .as_deref()
            .map(canonical_text)
            .unwrap_or_default();
        if let Some(label) = self.match_text(&institution) {
            return label.to_string();
        }

        if level.is_empty() {
            self.unclassified.clone()
        } else {
            level.to_uppercase()
        }
    }

    /// The rule whose keyword appears earliest in `text`. A longer phrase
    /// wins at the same position, then rule order.
    fn match_text(&self, text: &str) -> Option<&str> {
        if text.is_empty() {
            return None;
        }
        let tokens = tokenize(text);
        self.rules
            .iter()
            .enumerate()
            .filter_map(|(index, rule)| {
                std::iter::once(&rule.label)
                    .chain(rule.keywords.iter())
                    .filter_map(|keyword| {
                        let phrase = tokenize(keyword);
                        find_phrase(&tokens, &phrase)
                            .map(|position| (position, Reverse(phrase.len())))
                    })
                    .min()
                    .map(|(position, length)| ((position, length, index), rule))
            })
            .min_by_key(|(rank, _)| *rank)
            .map(|(_, rule)| rule.label.as_str())
    }

    /// Orders labels by the preference list; anything else follows
    /// alphabetically. Duplicates differing only in case or spacing collapse.
    pub fn sort_labels<I>(&self, labels: I) -> Vec<String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for label in labels {
            if !unique.iter().any(|existing| same_label(existing, &label)) {
                unique.push(label);
            }
        }

        unique.sort_by(|a, b| {
            let rank_a = self.preference_rank(a);
            let rank_b = self.preference_rank(b);
            rank_a
                .cmp(&rank_b)
                .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
                .then_with(|| a.cmp(b))
        });
        unique
    }

    fn preference_rank(&self, label: &str) -> usize {
        self.display_order
            .iter()
            .position(|preferred| same_label(preferred, label))
            .unwrap_or(self.display_order.len())
    }
}

/// Case and whitespace insensitive label comparison.
pub fn same_label(a: &str, b: &str) -> bool {
    canonical_text(a).to_lowercase() == canonical_text(b).to_lowercase()
}

fn canonical_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

fn find_phrase(tokens: &[String], phrase: &[String]) -> Option<usize> {
    if phrase.is_empty() {
        return None;
    }
    tokens.windows(phrase.len()).position(|window| window == phrase)
}
