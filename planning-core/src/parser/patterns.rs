//! Ordered pattern lists used to classify description fragments.

use regex::Regex;

use crate::error::ConfigError;

/// Where a description fragment ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fragment {
    Teacher,
    Group,
    Blacklisted,
    Undetermined,
}

/// A compiled list of patterns. A fragment matches when one of the patterns
/// matches at its beginning.
#[derive(Debug, Clone, Default)]
pub struct PatternList(Vec<Regex>);

impl PatternList {
    pub fn compile(path: &str, patterns: &[String]) -> Result<Self, ConfigError> {
        patterns
            .iter()
            .enumerate()
            .map(|(i, pattern)| {
                Regex::new(&format!("^(?:{pattern})")).map_err(|e| ConfigError::InvalidPattern {
                    path: format!("{path}[{i}]"),
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(PatternList)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn matches(&self, fragment: &str) -> bool {
        self.0.iter().any(|re| re.is_match(fragment))
    }
}

/// Teacher, group and blacklist patterns, tested in that order.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    pub teachers: PatternList,
    pub groups: PatternList,
    pub blacklist: PatternList,
}

impl Classifier {
    pub fn classify(&self, fragment: &str) -> Fragment {
        if self.teachers.matches(fragment) {
            Fragment::Teacher
        } else if self.groups.matches(fragment) {
            Fragment::Group
        } else if self.blacklist.matches(fragment) {
            Fragment::Blacklisted
        } else {
            Fragment::Undetermined
        }
    }

    pub fn is_empty(&self) -> bool {
        self.teachers.is_empty() && self.groups.is_empty() && self.blacklist.is_empty()
    }
}

/// Split `text` on `delimiter`, trimming fragments and dropping empty ones.
pub fn fragments<'a>(text: &'a str, delimiter: &'a str) -> impl Iterator<Item = &'a str> {
    text.split(delimiter)
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(patterns: &[&str]) -> PatternList {
        let owned: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
        PatternList::compile("patterns", &owned).unwrap()
    }

    #[test]
    fn test_patterns_are_anchored_at_the_start() {
        let teachers = list(&["M\\. "]);
        assert!(teachers.matches("M. Dupont"));
        assert!(!teachers.matches("Salle M. Dupont"));
    }

    #[test]
    fn test_classification_order() {
        let classifier = Classifier {
            teachers: list(&["[A-Z]+ [A-Z][a-z]+$"]),
            groups: list(&["TD\\d", "[A-Z]+ "]),
            blacklist: list(&["\\(Export", "TD"]),
        };

        assert_eq!(classifier.classify("DUPONT Jean"), Fragment::Teacher);
        assert_eq!(classifier.classify("TD1"), Fragment::Group);
        assert_eq!(classifier.classify("(Exporté le 01/02/2025)"), Fragment::Blacklisted);
        assert_eq!(classifier.classify("something else"), Fragment::Undetermined);
    }

    #[test]
    fn test_malformed_pattern_names_its_position() {
        let err = PatternList::compile("branches[0].parser.blacklist", &["ok".into(), "(".into()])
            .unwrap_err();
        match err {
            ConfigError::InvalidPattern { path, pattern, .. } => {
                assert_eq!(path, "branches[0].parser.blacklist[1]");
                assert_eq!(pattern, "(");
            }
            other => panic!("Expected InvalidPattern, got {:?}", other),
        }
    }

    #[test]
    fn test_fragments_skip_blank_pieces() {
        let pieces: Vec<&str> = fragments("\n\nTD1\n  \nM. Dupont \n", "\n").collect();
        assert_eq!(pieces, vec!["TD1", "M. Dupont"]);
    }
}
