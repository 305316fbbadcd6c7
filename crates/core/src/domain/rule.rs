// Rules - ordered (matcher, generator) pairs deciding how a snippet is run

use crate::domain::error::{DomainError, Result};
use crate::domain::generator::CommandGenerator;
use crate::domain::snippet::Snippet;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Predicate over the whole snippet (filename and content)
pub type SnippetPredicate = dyn Fn(&Snippet) -> bool + Send + Sync;

/// Decides whether a rule applies to a snippet
#[derive(Clone)]
pub enum Matcher {
    /// Regular expression tested against the filename
    Pattern(Regex),
    /// Arbitrary predicate over the full snippet
    Predicate(Arc<SnippetPredicate>),
}

impl Matcher {
    pub fn pattern(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(Matcher::Pattern)
            .map_err(|e| DomainError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Snippet) -> bool + Send + Sync + 'static,
    {
        Matcher::Predicate(Arc::new(f))
    }

    pub fn matches(&self, snippet: &Snippet) -> bool {
        match self {
            Matcher::Pattern(regex) => regex.is_match(snippet.filename()),
            Matcher::Predicate(predicate) => predicate(snippet),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Pattern(regex) => f.debug_tuple("Pattern").field(&regex.as_str()).finish(),
            Matcher::Predicate(_) => f.write_str("Predicate(<fn>)"),
        }
    }
}

/// A matcher paired with the generator that builds its command
#[derive(Clone)]
pub struct Rule {
    label: String,
    matcher: Matcher,
    generator: Arc<dyn CommandGenerator>,
}

impl Rule {
    pub fn new(
        label: impl Into<String>,
        matcher: Matcher,
        generator: Arc<dyn CommandGenerator>,
    ) -> Self {
        Self {
            label: label.into(),
            matcher,
            generator,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn generator(&self) -> &Arc<dyn CommandGenerator> {
        &self.generator
    }

    pub fn matches(&self, snippet: &Snippet) -> bool {
        self.matcher.matches(snippet)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("label", &self.label)
            .field("matcher", &self.matcher)
            .field("generator", &self.generator.describe())
            .finish()
    }
}

/// Ordered, immutable list of rules. First match wins.
#[derive(Clone, Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// User rules are placed ahead of the built-in defaults
    pub fn merged(user: Vec<Rule>, defaults: Vec<Rule>) -> Self {
        let mut rules = user;
        rules.extend(defaults);
        Self { rules }
    }

    /// First rule whose matcher accepts the snippet (later rules are not evaluated)
    pub fn first_match(&self, snippet: &Snippet) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.matches(snippet))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::generator;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn rule(label: &str, pattern: &str) -> Rule {
        let command = format!("run-{}", label);
        Rule::new(
            label,
            Matcher::pattern(pattern).unwrap(),
            generator::from_fn(move |_, _, _| Ok(command.clone())),
        )
    }

    fn permutations(items: Vec<Rule>) -> Vec<Vec<Rule>> {
        if items.len() <= 1 {
            return vec![items];
        }
        let mut out = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.clone();
            let head = rest.remove(i);
            for mut tail in permutations(rest) {
                tail.insert(0, head.clone());
                out.push(tail);
            }
        }
        out
    }

    #[test]
    fn test_pattern_matches_filename_only() {
        let matcher = Matcher::pattern(r"\.sh$").unwrap();
        assert!(matcher.matches(&Snippet::new("c", "hello.sh", "shell", "")));
        assert!(!matcher.matches(&Snippet::new("c", "hello.py", "python", "x.sh")));
    }

    #[test]
    fn test_predicate_can_inspect_content() {
        let matcher = Matcher::predicate(|s| {
            s.filename().ends_with(".js") && s.content().contains("//nvm:")
        });
        assert!(matcher.matches(&Snippet::new("c", "a.js", "js", "//nvm: v6.10.1\n")));
        assert!(!matcher.matches(&Snippet::new("c", "a.js", "js", "console.log(1)")));
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let err = Matcher::pattern("(unclosed").unwrap_err();
        assert!(matches!(err, DomainError::InvalidPattern { .. }));
    }

    #[test]
    fn test_first_match_wins_for_every_permutation() {
        let rules = vec![rule("sh", r"\.sh$"), rule("py", r"\.py$"), rule("rb", r"\.rb$")];
        let cases = [("a.sh", "sh"), ("b.py", "py"), ("c.rb", "rb")];

        for ordering in permutations(rules) {
            let set = RuleSet::new(ordering);
            for (filename, expected) in cases {
                let snippet = Snippet::new("c", filename, "", "");
                assert_eq!(set.first_match(&snippet).unwrap().label(), expected);
            }
        }
    }

    #[test]
    fn test_overlapping_rules_resolve_by_order() {
        let set = RuleSet::merged(vec![rule("user", r"\.js$")], vec![rule("default", r"\.js$")]);
        let snippet = Snippet::new("c", "app.js", "javascript", "");
        assert_eq!(set.first_match(&snippet).unwrap().label(), "user");
    }

    #[test]
    fn test_matching_short_circuits() {
        let evaluated = Arc::new(AtomicUsize::new(0));
        let counter = evaluated.clone();
        let later = Rule::new(
            "later",
            Matcher::predicate(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }),
            generator::from_fn(|_, _, _| Ok("later".to_string())),
        );
        let set = RuleSet::new(vec![rule("sh", r"\.sh$"), later]);

        set.first_match(&Snippet::new("c", "a.sh", "", ""));
        assert_eq!(evaluated.load(Ordering::SeqCst), 0);

        set.first_match(&Snippet::new("c", "a.txt", "", ""));
        assert_eq!(evaluated.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_match() {
        let set = RuleSet::new(vec![rule("sh", r"\.sh$")]);
        assert!(set.first_match(&Snippet::new("c", "notes.txt", "", "")).is_none());
        assert!(RuleSet::default().is_empty());
        assert_eq!(set.len(), 1);
    }
}
