//! Natural-language command interpreter
//!
//! Turns free-text requests such as "create a folder called notes" into
//! literal commands for the executor. Matching is first-match-wins over a
//! [`RuleCatalog`]: multi-step rules are tried before single-step rules,
//! each group in declaration order.
//!
//! An input no rule understands comes back unchanged (after normalization)
//! as a single-element list. Callers detect that case with
//! [`is_passthrough`].

use crate::rules::{RuleCatalog, PHRASE_HELP};
use regex::{Captures, Regex};
use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

/// Stateless interpreter over a shared, immutable catalog
#[derive(Clone, Debug)]
pub struct Interpreter {
    catalog: Arc<RuleCatalog>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Arc::new(RuleCatalog::builtin()))
    }
}

impl Interpreter {
    pub fn new(catalog: Arc<RuleCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    /// Convert free text into the commands to run, in order
    pub fn interpret(&self, text: &str) -> Vec<String> {
        interpret(&self.catalog, text)
    }

    /// Candidate command names for text that matched no rule
    pub fn suggest(&self, text: &str) -> BTreeSet<String> {
        suggest(&self.catalog, text)
    }

    /// Example phrases and the commands they map to
    pub fn help(&self) -> &'static str {
        PHRASE_HELP
    }
}

/// Lowercase and trim; the form used both for matching and for captures
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Interpret `text` against `catalog`.
///
/// Returns the substituted templates of the first matching multi-step rule,
/// else the one substituted template of the first matching single-step rule,
/// else `[normalize(text)]`.
pub fn interpret(catalog: &RuleCatalog, text: &str) -> Vec<String> {
    let normalized = normalize(text);

    for rule in catalog.multi_step() {
        if let Some(caps) = rule.regex().captures(&normalized) {
            let groups = captured_groups(&caps);
            tracing::debug!(pattern = rule.pattern(), "multi-step rule matched");
            return rule
                .templates()
                .iter()
                .map(|template| fill_template(template, &groups))
                .collect();
        }
    }

    for rule in catalog.rules() {
        if let Some(caps) = rule.regex().captures(&normalized) {
            let groups = captured_groups(&caps);
            tracing::debug!(pattern = rule.pattern(), "rule matched");
            return vec![fill_template(rule.template(), &groups)];
        }
    }

    tracing::debug!(input = %normalized, "no rule matched");
    vec![normalized]
}

/// True when `result` is the no-match sentinel for `text`
pub fn is_passthrough(text: &str, result: &[String]) -> bool {
    matches!(result, [only] if *only == normalize(text))
}

/// Union of the keyword suggestions for every whitespace-separated token
pub fn suggest(catalog: &RuleCatalog, text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .filter_map(|word| catalog.keyword(word))
        .flatten()
        .cloned()
        .collect()
}

fn captured_groups(caps: &Captures<'_>) -> Vec<String> {
    caps.iter()
        .skip(1)
        .map(|group| group.map(|m| m.as_str().to_string()).unwrap_or_default())
        .collect()
}

fn placeholder_re() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{(\d+)\}").unwrap())
}

/// Replace `{N}` with `groups[N]`.
///
/// A template that references a group the pattern did not capture is
/// returned verbatim.
pub fn fill_template(template: &str, groups: &[String]) -> String {
    let re = placeholder_re();

    let shortfall = re.captures_iter(template).any(|caps| {
        caps[1]
            .parse::<usize>()
            .map_or(true, |index| index >= groups.len())
    });
    if shortfall {
        tracing::warn!(
            template,
            groups = groups.len(),
            "template references a missing capture; using it verbatim"
        );
        return template.to_string();
    }

    re.replace_all(template, |caps: &Captures<'_>| {
        caps[1]
            .parse::<usize>()
            .ok()
            .and_then(|index| groups.get(index))
            .cloned()
            .unwrap_or_default()
    })
    .into_owned()
}
