//! Exclusion rules
//!
//! A small ordered rule engine deciding whether a file is left out of an
//! upload. Each rule is one of:
//!
//! - `/abs/dir/*` or `/abs/dir/*.ext`: rooted wildcard, checked against the
//!   absolute path. `/*` only matches immediate children.
//! - `/abs/path`: absolute prefix.
//! - `dir/`: a whole subtree, relative to the scan root.
//! - `dir/*`: immediate children of `dir` only.
//! - `*.log`, `a?c.txt`: glob against the relative path, plus suffix
//!   matching for rules starting with `*`.
//! - anything else: exact relative path.
//!
//! Rules are tried in order and the first match wins. Deep `**` matching is
//! not supported. Character classes may be negated with `[^...]` as well as
//! `[!...]`.

use std::borrow::Cow;

use glob::{MatchOptions, Pattern};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// An ordered list of exclusion rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcludeRules {
    rules: Vec<String>,
}

impl ExcludeRules {
    /// Build a rule list, trimming whitespace and dropping empty rules
    pub fn new<I, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            rules: rules
                .into_iter()
                .map(|r| r.as_ref().trim().to_string())
                .filter(|r| !r.is_empty())
                .collect(),
        }
    }

    /// Parse a comma-separated rule list such as `"node_modules/,*.log"`
    pub fn parse_list(list: &str) -> Vec<String> {
        list.split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(String::as_str)
    }

    /// Decide whether a file is excluded
    ///
    /// `relative` is the path below the scan root, `absolute` the full path.
    /// The file is excluded if either form matches any rule.
    pub fn is_excluded(&self, relative: &str, absolute: &str) -> bool {
        if self.rules.is_empty() {
            return false;
        }

        let absolute = to_slash(absolute);
        self.matches(&to_slash(relative), &absolute) || self.matches(&absolute, &absolute)
    }

    fn matches(&self, path: &str, absolute: &str) -> bool {
        self.rules
            .iter()
            .any(|rule| rule_matches(rule, path, absolute))
    }
}

/// Check a single candidate path against a rule list
pub fn is_excluded(path: &str, absolute: &str, rules: &[String]) -> bool {
    let (path, absolute) = (to_slash(path), to_slash(absolute));
    rules.iter().any(|rule| rule_matches(rule, &path, &absolute))
}

fn rule_matches(rule: &str, path: &str, absolute: &str) -> bool {
    if rule.starts_with('/') {
        if rule.contains('*') && rooted_wildcard_matches(rule, absolute) {
            return true;
        }
        return absolute == rule || absolute.starts_with(rule);
    }

    if rule.ends_with('/') && path.starts_with(rule) {
        return true;
    }

    if rule.contains('*') {
        if let Some(prefix) = rule.strip_suffix("/*") {
            return path
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix('/'))
                .is_some_and(|rest| !rest.contains('/'));
        }

        if glob_matches(rule, path) {
            return true;
        }

        // "*.log" also matches "logs/app.log"
        return rule
            .strip_prefix('*')
            .is_some_and(|suffix| path.ends_with(suffix));
    }

    path == rule
}

fn rooted_wildcard_matches(rule: &str, absolute: &str) -> bool {
    let prefix = rule.split('*').next().unwrap_or_default();
    let Some(rest) = absolute.strip_prefix(prefix) else {
        return false;
    };

    if rule.ends_with("/*") {
        return !rest.contains('/');
    }

    glob_matches(base_name(rule), base_name(absolute))
}

fn glob_matches(pattern: &str, candidate: &str) -> bool {
    match Pattern::new(&caret_negation(pattern)) {
        Ok(p) => p.matches_with(candidate, MATCH_OPTIONS),
        Err(e) => {
            tracing::debug!(pattern, error = %e, "Ignoring malformed exclusion pattern");
            false
        }
    }
}

/// Rewrite `[^...]` classes to the `[!...]` form `glob` understands
fn caret_negation(pattern: &str) -> Cow<'_, str> {
    if !pattern.contains("[^") {
        return Cow::Borrowed(pattern);
    }

    let mut out = String::with_capacity(pattern.len());
    let mut in_class = false;
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        out.push(c);
        match c {
            '[' if !in_class => {
                in_class = true;
                if chars.next_if_eq(&'^').is_some() {
                    out.push('!');
                }
            }
            ']' if in_class => in_class = false,
            _ => {}
        }
    }
    Cow::Owned(out)
}

fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

fn to_slash(path: &str) -> String {
    if cfg!(windows) {
        path.replace('\\', "/")
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(list: &[&str]) -> ExcludeRules {
        ExcludeRules::new(list)
    }

    fn excluded(list: &[&str], rel: &str) -> bool {
        rules(list).is_excluded(rel, &format!("/root/site/{rel}"))
    }

    #[test]
    fn test_no_rules() {
        assert!(!excluded(&[], "a.txt"));
    }

    #[test]
    fn test_exact_rule() {
        assert!(excluded(&["a.txt"], "a.txt"));
        assert!(!excluded(&["a.txt"], "sub/a.txt"));
        assert!(!excluded(&["a.txt"], "a.txt.bak"));
    }

    #[test]
    fn test_directory_rule_covers_subtree() {
        let list = ["a/"];
        assert!(excluded(&list, "a/x"));
        assert!(excluded(&list, "a/b/c"));
        assert!(excluded(&list, "a/b/c/d.txt"));
        assert!(!excluded(&list, "ab/x"));
        assert!(!excluded(&list, "b/a/x"));
    }

    #[test]
    fn test_shallow_wildcard_only_immediate_children() {
        let list = ["a/*"];
        assert!(excluded(&list, "a/b"));
        assert!(!excluded(&list, "a/b/c"));
        assert!(!excluded(&list, "ab/c"));
    }

    #[test]
    fn test_extension_rule() {
        let list = ["*.log"];
        assert!(excluded(&list, "app.log"));
        assert!(excluded(&list, "logs/2024/app.log"));
        assert!(!excluded(&list, "app.log.gz"));
    }

    #[test]
    fn test_glob_does_not_cross_separator() {
        let list = ["src/*.rs"];
        assert!(excluded(&list, "src/main.rs"));
        assert!(!excluded(&list, "src/bin/tool.rs"));
    }

    #[test]
    fn test_question_mark_and_class() {
        assert!(excluded(&["log?.*"], "log1.txt"));
        assert!(!excluded(&["log?.*"], "log10.txt"));
        assert!(excluded(&["[ab]*.txt"], "b.txt"));
        assert!(!excluded(&["[ab]*.txt"], "c.txt"));
    }

    #[test]
    fn test_negated_class() {
        for list in [["[^a]*.txt"], ["[!a]*.txt"]] {
            assert!(!excluded(&list, "a.txt"));
            assert!(excluded(&list, "b.txt"));
        }
        assert!(excluded(&["x[a^]*"], "x^1"));
        assert!(!excluded(&["x[a^]*"], "xb1"));
    }

    #[test]
    fn test_caret_negation_rewrite() {
        assert_eq!(caret_negation("[^a]*.txt"), "[!a]*.txt");
        assert_eq!(caret_negation("[a^]*"), "[a^]*");
        assert_eq!(caret_negation("[^a][^b]"), "[!a][!b]");
        assert!(matches!(caret_negation("*.log"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_glob_syntax_without_star_is_exact() {
        assert!(!excluded(&["file?.txt"], "file1.txt"));
        assert!(excluded(&["file?.txt"], "file?.txt"));
    }

    #[test]
    fn test_malformed_glob_never_matches() {
        assert!(!excluded(&["[unclosed*"], "[unclosed.txt"));
    }

    #[test]
    fn test_absolute_prefix_rule() {
        let list = ["/root/site/private"];
        assert!(excluded(&list, "private/key.pem"));
        assert!(excluded(&list, "private"));
        assert!(!excluded(&list, "public/index.html"));
    }

    #[test]
    fn test_absolute_wildcard_immediate_children() {
        let list = ["/root/site/cache/*"];
        assert!(excluded(&list, "cache/a.bin"));
        assert!(!excluded(&list, "cache/deep/a.bin"));
    }

    #[test]
    fn test_absolute_wildcard_base_name() {
        let list = ["/root/site/logs/*.log"];
        assert!(excluded(&list, "logs/app.log"));
        assert!(!excluded(&list, "logs/app.txt"));
        assert!(!excluded(&list, "other/app.log"));
    }

    #[test]
    fn test_first_match_wins_any_order() {
        assert!(excluded(&["nothing", "*.tmp"], "x.tmp"));
        assert!(excluded(&["*.tmp", "nothing"], "x.tmp"));
    }

    #[test]
    fn test_scenario_node_modules() {
        let list = ["node_modules/*"];
        assert!(excluded(&list, "node_modules/c.js"));
        assert!(!excluded(&list, "a.txt"));
        assert!(!excluded(&list, "sub/b.txt"));
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(
            ExcludeRules::parse_list(" .git/ , *.log,,node_modules/* "),
            vec![".git/", "*.log", "node_modules/*"]
        );
        assert!(ExcludeRules::parse_list("").is_empty());
    }

    #[test]
    fn test_new_drops_blank_rules() {
        let r = rules(&["  ", "a/", ""]);
        assert_eq!(r.len(), 1);
        assert_eq!(r.iter().collect::<Vec<_>>(), vec!["a/"]);
    }

    #[test]
    fn test_free_function() {
        let list = vec!["build/".to_string()];
        assert!(is_excluded("build/out.o", "/w/build/out.o", &list));
        assert!(!is_excluded("src/lib.rs", "/w/src/lib.rs", &list));
    }
}
