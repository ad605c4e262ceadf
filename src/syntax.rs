//! # Syntax
//!
//! The built-in syntax highlighting table and filename-based syntax selection.
//!
//! Unlike a plugin-loaded syntax definition file, this table is `const` data compiled into the
//! binary: the editor never reads syntax definitions off disk.

/// Configuration for syntax highlighting of one language.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Conf {
    /// The name of the language, e.g. "c".
    pub name: &'static str,
    /// Filename patterns that select this definition (see [`Conf::matches`]).
    patterns: &'static [&'static str],
    /// Whether to highlight numbers.
    pub highlight_numbers: bool,
    /// Whether to highlight single-quoted/double-quoted strings.
    pub highlight_strings: bool,
    /// The token that starts a single-line comment, e.g. `"//"`, if any.
    pub sl_comment_start: Option<String>,
    /// The start/end delimiter pair for a multi-line comment, e.g. `("/*", "*/")`, if any.
    pub ml_comment_delims: Option<(String, String)>,
    /// Keywords to highlight. A keyword ending in `|` is a *secondary* keyword (rendered with
    /// [`crate::highlight::HlType::Keyword2`], conventionally used for type names); all others are
    /// *primary* keywords ([`crate::highlight::HlType::Keyword1`]).
    pub keywords: Vec<String>,
}

impl Default for Conf {
    /// The "no syntax" configuration: no highlighting rules at all beyond plain text.
    fn default() -> Self {
        Self {
            name: "no ft",
            patterns: &[],
            highlight_numbers: false,
            highlight_strings: false,
            sl_comment_start: None,
            ml_comment_delims: None,
            keywords: Vec::new(),
        }
    }
}

impl Conf {
    /// Return whether `filename` is associated with this syntax definition by one of its patterns.
    /// A pattern beginning with `.` matches only as a literal trailing suffix; any other pattern
    /// matches anywhere as a substring.
    fn matches(&self, filename: &str) -> bool {
        self.patterns.iter().any(|p| if let Some(stripped) = p.strip_prefix('.') {
            filename.ends_with(&format!(".{stripped}"))
        } else {
            filename.contains(p)
        })
    }

    /// Select a syntax definition for `filename` by matching it against each built-in definition's
    /// patterns, in table order. Returns the default (no-highlighting) configuration if none match.
    pub fn select(filename: &str) -> Self {
        builtin_table().into_iter().find(|conf| conf.matches(filename)).unwrap_or_default()
    }

    /// Look up a built-in syntax definition by name, for tests and tooling.
    #[cfg(test)]
    pub fn get(name: &str) -> Option<Self> { builtin_table().into_iter().find(|c| c.name == name) }
}

/// Build a `Vec<String>` of keywords from a space-separated primary list and a space-separated
/// secondary list (conventionally type names), tagging secondary keywords with a trailing `|`.
fn keywords(primary: &str, secondary: &str) -> Vec<String> {
    primary
        .split_whitespace()
        .map(String::from)
        .chain(secondary.split_whitespace().map(|k| format!("{k}|")))
        .collect()
}

/// The built-in syntax table. At least the C family entry spec.md §6 requires. Built fresh on each
/// lookup: the table is tiny and owns `Vec<String>` keyword lists, which can't be `const`.
fn builtin_table() -> Vec<Conf> {
    vec![Conf {
        name: "c",
        patterns: &[".c", ".h", ".cpp", ".hpp"],
        highlight_numbers: true,
        highlight_strings: true,
        sl_comment_start: Some("//".to_string()),
        ml_comment_delims: Some(("/*".to_string(), "*/".to_string())),
        keywords: keywords(
            "switch if while for break continue return else struct union typedef static enum \
             class case",
            "int long double float char unsigned signed void",
        ),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::HlType;

    #[test]
    fn selects_c_syntax_by_suffix() {
        for name in [".c", ".h", ".cpp", ".hpp"] {
            let conf = Conf::select(&format!("main{name}"));
            assert_eq!(conf.name, "c");
        }
    }

    #[test]
    fn dot_pattern_is_a_suffix_not_a_substring() {
        // "foo.cpp.bak" does not end with ".cpp"
        let conf = Conf::select("foo.cpp.bak");
        assert_eq!(conf.name, "no ft");
    }

    #[test]
    fn unknown_extension_gets_default_conf() {
        let conf = Conf::select("README.md");
        assert_eq!(conf, Conf::default());
    }

    #[test]
    fn primary_and_secondary_keywords_are_tagged() {
        let conf = Conf::select("a.c");
        assert!(conf.keywords.iter().any(|k| k == "if"));
        assert!(conf.keywords.iter().any(|k| k == "int|"));
    }

    #[test]
    fn keyword_rendering_types_are_consistent_with_highlighter() {
        // Sanity check that the `|` convention lines up with HlType::Keyword2 in the scanner.
        let conf = Conf::select("a.c");
        let (hl, _) = crate::highlight::scan_row(b"int", &conf, false);
        assert_eq!(hl, [HlType::Keyword2, HlType::Keyword2, HlType::Keyword2]);
    }
}
