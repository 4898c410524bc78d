use crate::models::course::slugify;

/// Maps import labels to course slugs.
///
/// Lookups ignore case and surrounding or repeated whitespace.
#[derive(Debug, Clone)]
pub struct LabelTable {
    entries: Vec<(String, String)>,
}

const DEFAULT_LABELS: &[(&str, &str)] = &[
    ("Basics of Trading", "basics-of-trading"),
    ("Advanced Trading", "advanced-trading"),
    ("Options Trading", "options-trading"),
    ("Technical Analysis", "technical-analysis"),
    ("Personal Finance", "personal-finance"),
];

fn key(label: &str) -> String {
    label.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

impl Default for LabelTable {
    fn default() -> Self {
        LabelTable::from_pairs(DEFAULT_LABELS.iter().map(|(l, s)| (l.to_string(), s.to_string())))
    }
}

impl LabelTable {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        LabelTable {
            entries: pairs
                .into_iter()
                .map(|(label, slug)| (key(&label), slug))
                .collect(),
        }
    }

    /// Parse `Label=slug;Other Label=other-slug`. An entry without `=` maps
    /// the label to its own slug.
    pub fn parse(spec: &str) -> Self {
        LabelTable::from_pairs(spec.split(';').filter_map(|entry| {
            let entry = entry.trim();
            if entry.is_empty() {
                return None;
            }
            Some(match entry.split_once('=') {
                Some((label, slug)) => (label.trim().to_string(), slug.trim().to_string()),
                None => (entry.to_string(), slugify(entry)),
            })
        }))
    }

    /// The table from `IMPORT_LABEL_MAP` when set, else the built-in one.
    pub fn from_env() -> Self {
        match std::env::var("IMPORT_LABEL_MAP") {
            Ok(spec) if !spec.trim().is_empty() => LabelTable::parse(&spec),
            _ => LabelTable::default(),
        }
    }

    pub fn resolve(&self, label: &str) -> Option<&str> {
        let k = key(label);
        self.entries
            .iter()
            .find(|(l, _)| *l == k)
            .map(|(_, slug)| slug.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Split a semicolon-delimited labels cell.
pub fn split_labels(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_is_case_insensitive() {
        let table = LabelTable::default();
        assert_eq!(table.resolve("basics  of TRADING"), Some("basics-of-trading"));
        assert_eq!(table.resolve("Newsletter"), None);
    }

    #[test]
    fn parse_custom_table() {
        let table = LabelTable::parse("Gold Member = gold-course; Crypto 101");
        assert_eq!(table.len(), 2);
        assert_eq!(table.resolve("gold member"), Some("gold-course"));
        assert_eq!(table.resolve("Crypto 101"), Some("crypto-101"));
    }

    #[test]
    fn split_ignores_blanks() {
        assert_eq!(split_labels(" A ;; B;"), vec!["A", "B"]);
        assert!(split_labels("  ").is_empty());
    }
}
