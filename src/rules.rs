//! Rule catalog for the natural-language interpreter
//!
//! A catalog is an ordered list of multi-step rules, an ordered list of
//! single-step rules and a keyword table used for suggestions. Order is
//! significant: the interpreter takes the first rule that matches, so
//! narrow patterns must be declared before broad ones.
//!
//! The built-in catalog covers everyday file, navigation and process
//! phrasing. Extra rules can be loaded from a YAML file:
//!
//! ```yaml
//! multi_step:
//!   - pattern: "back up (\\S+) into (\\S+)"
//!     templates: ["mkdir -p {1}", "cp {0} {1}/"]
//! rules:
//!   - pattern: "say (.+)"
//!     template: "echo {0}"
//! keywords:
//!   say: [echo]
//! ```

use crate::error::{Result, ShellError};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// A pattern mapped to a single command template
#[derive(Clone, Debug)]
pub struct Rule {
    pattern: Regex,
    template: String,
}

impl Rule {
    pub fn new(pattern: &str, template: impl Into<String>) -> Result<Self> {
        Ok(Self {
            pattern: compile_pattern(pattern)?,
            template: template.into(),
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub(crate) fn regex(&self) -> &Regex {
        &self.pattern
    }
}

/// A pattern mapped to an ordered sequence of command templates
#[derive(Clone, Debug)]
pub struct MultiStepRule {
    pattern: Regex,
    templates: Vec<String>,
}

impl MultiStepRule {
    pub fn new<I, S>(pattern: &str, templates: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self {
            pattern: compile_pattern(pattern)?,
            templates: templates.into_iter().map(Into::into).collect(),
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn templates(&self) -> &[String] {
        &self.templates
    }

    pub(crate) fn regex(&self) -> &Regex {
        &self.pattern
    }
}

/// Immutable, ordered set of interpretation rules
#[derive(Clone, Debug, Default)]
pub struct RuleCatalog {
    multi_step: Vec<MultiStepRule>,
    rules: Vec<Rule>,
    keywords: HashMap<String, Vec<String>>,
}

/// On-disk shape of a rule file
#[derive(Debug, Default, Serialize, Deserialize)]
struct RuleFile {
    #[serde(default)]
    multi_step: Vec<MultiStepEntry>,
    #[serde(default)]
    rules: Vec<RuleEntry>,
    #[serde(default)]
    keywords: HashMap<String, Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MultiStepEntry {
    pattern: String,
    templates: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RuleEntry {
    pattern: String,
    template: String,
}

impl RuleCatalog {
    /// Build a catalog from already-compiled rules
    pub fn new(
        multi_step: Vec<MultiStepRule>,
        rules: Vec<Rule>,
        keywords: HashMap<String, Vec<String>>,
    ) -> Self {
        Self {
            multi_step,
            rules,
            keywords,
        }
    }

    /// The built-in catalog
    pub fn builtin() -> Self {
        let multi_step = BUILTIN_MULTI_STEP
            .iter()
            .map(|(pattern, templates)| {
                MultiStepRule::new(pattern, templates.iter().copied())
                    .expect("built-in multi-step pattern must compile")
            })
            .collect();

        let rules = BUILTIN_RULES
            .iter()
            .map(|(pattern, template)| {
                Rule::new(pattern, *template).expect("built-in pattern must compile")
            })
            .collect();

        let keywords = BUILTIN_KEYWORDS
            .iter()
            .map(|(word, commands)| {
                (
                    word.to_string(),
                    commands.iter().map(|c| c.to_string()).collect(),
                )
            })
            .collect();

        Self::new(multi_step, rules, keywords)
    }

    /// Load a catalog from a YAML rule file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ShellError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_yaml(&content, path)
    }

    /// Load a catalog from YAML text
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Self::parse_yaml(content, Path::new("<inline>"))
    }

    fn parse_yaml(content: &str, origin: &Path) -> Result<Self> {
        let file: RuleFile = serde_yaml::from_str(content).map_err(|source| ShellError::Yaml {
            path: origin.to_path_buf(),
            source,
        })?;

        let multi_step = file
            .multi_step
            .into_iter()
            .map(|entry| MultiStepRule::new(&entry.pattern, entry.templates))
            .collect::<Result<Vec<_>>>()?;
        let rules = file
            .rules
            .into_iter()
            .map(|entry| Rule::new(&entry.pattern, entry.template))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            origin = %origin.display(),
            multi_step = multi_step.len(),
            rules = rules.len(),
            keywords = file.keywords.len(),
            "loaded rule file"
        );

        Ok(Self::new(multi_step, rules, file.keywords))
    }

    /// Combine with user rules. User rules are tried first in each phase;
    /// keyword suggestions are merged.
    pub fn with_overrides(self, user: RuleCatalog) -> Self {
        let mut multi_step = user.multi_step;
        multi_step.extend(self.multi_step);

        let mut rules = user.rules;
        rules.extend(self.rules);

        let mut keywords = self.keywords;
        for (word, commands) in user.keywords {
            let entry = keywords.entry(word).or_default();
            for command in commands {
                if !entry.contains(&command) {
                    entry.push(command);
                }
            }
        }

        Self::new(multi_step, rules, keywords)
    }

    pub fn multi_step(&self) -> &[MultiStepRule] {
        &self.multi_step
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Suggestions registered for a single lowercase keyword
    pub fn keyword(&self, word: &str) -> Option<&[String]> {
        self.keywords.get(word).map(Vec::as_slice)
    }

    /// Human-readable listing in evaluation order
    pub fn describe(&self) -> Vec<String> {
        let multi = self
            .multi_step
            .iter()
            .map(|r| format!("[multi] {} => {}", r.pattern(), r.templates().join("; ")));
        let single = self
            .rules
            .iter()
            .map(|r| format!("[rule]  {} => {}", r.pattern(), r.template()));
        multi.chain(single).collect()
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| ShellError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
}

const BUILTIN_MULTI_STEP: &[(&str, &[&str])] = &[
    (
        r#"create (?:a )?(?:new )?(?:folder|directory) (?:called |named )?['"]?([^'"]+)['"]? and (?:move|put) ['"]?([^'"]+)['"]? (?:into it|there|inside)"#,
        &["mkdir {0}", "mv {1} {0}/"],
    ),
    (
        r#"make (?:a )?(?:new )?(?:folder|directory) ['"]?([^'"]+)['"]? and (?:copy|put) ['"]?([^'"]+)['"]? (?:into it|there|inside)"#,
        &["mkdir {0}", "cp {1} {0}/"],
    ),
    (
        r#"create ['"]?([^'"]+)['"]? (?:folder|directory) and move ['"]?([^'"]+)['"]? (?:into it|there)"#,
        &["mkdir {0}", "mv {1} {0}/"],
    ),
];

const BUILTIN_RULES: &[(&str, &str)] = &[
    // Creating
    (r#"create (?:a )?(?:new )?(?:file|document) (?:called |named |with name )?['"]?([^'"]+)['"]?"#, "touch {0}"),
    (r#"make (?:a )?(?:new )?(?:file|document) (?:called |named |with name )?['"]?([^'"]+)['"]?"#, "touch {0}"),
    (r#"create (?:a )?(?:new )?(?:folder|directory) (?:called |named |with name )?['"]?([^'"]+)['"]?"#, "mkdir {0}"),
    (r#"make (?:a )?(?:new )?(?:folder|directory) (?:called |named |with name )?['"]?([^'"]+)['"]?"#, "mkdir {0}"),
    // Deleting
    (r#"delete (?:the )?(?:file|document) (?:called |named )?['"]?([^'"]+)['"]?"#, "rm {0}"),
    (r#"remove (?:the )?(?:file|document) (?:called |named )?['"]?([^'"]+)['"]?"#, "rm {0}"),
    (r#"delete (?:the )?(?:folder|directory) (?:called |named )?['"]?([^'"]+)['"]?"#, "rm -r {0}"),
    (r#"remove (?:the )?(?:folder|directory) (?:called |named )?['"]?([^'"]+)['"]?"#, "rm -r {0}"),
    // Copying
    (r#"copy ['"]?([^'"]+)['"]? to (?:the )?['"]?([^'"]+)['"]?(?: folder| directory)?"#, "cp {0} {1}"),
    (r#"copy ['"]?([^'"]+)['"]? into (?:the )?['"]?([^'"]+)['"]?(?: folder| directory)?"#, "cp {0} {1}/"),
    (r#"duplicate ['"]?([^'"]+)['"]? (?:as |to |into )?['"]?([^'"]+)['"]?"#, "cp {0} {1}"),
    // Moving
    (r#"move ['"]?([^'"]+)['"]? to (?:the )?['"]?([^'"]+)['"]?(?: folder| directory)?"#, "mv {0} {1}"),
    (r#"move ['"]?([^'"]+)['"]? into (?:the )?['"]?([^'"]+)['"]?(?: folder| directory)?"#, "mv {0} {1}/"),
    (r#"rename ['"]?([^'"]+)['"]? to ['"]?([^'"]+)['"]?"#, "mv {0} {1}"),
    // Navigation
    (r#"go to (?:the )?(?:folder|directory) (?:called |named )?['"]?([^'"]+)['"]?"#, "cd {0}"),
    (r#"change to (?:the )?(?:folder|directory) (?:called |named )?['"]?([^'"]+)['"]?"#, "cd {0}"),
    (r#"navigate to ['"]?([^'"]+)['"]?"#, "cd {0}"),
    (r"(?:go|move) up", "cd .."),
    (r"(?:go|move) back", "cd .."),
    (r"go home", "cd ~"),
    // Listing
    (r"(?:list|show)(?: me)?(?: all)?(?: the)? files", "ls"),
    (r"(?:list|show)(?: me)?(?: all)?(?: the)? contents", "ls"),
    (r"(?:list|show)(?: me)?(?: all)?(?: the)? items", "ls"),
    (r"what'?s (?:in )?(?:here|this folder|this directory)", "ls"),
    (r"list (?:all )?(?:files|contents) with details", "ls -la"),
    (r"show (?:all )?(?:files|contents) with details", "ls -la"),
    (r#"list (?:all )?(?:files )?in (?:the )?(?:folder |directory )?(?:called |named )?['"]?([^'"]+)['"]?"#, "ls {0}"),
    (r#"show (?:me )?(?:all )?(?:files )?in (?:the )?(?:folder |directory )?(?:called |named )?['"]?([^'"]+)['"]?"#, "ls {0}"),
    // Viewing
    (r#"(?:show|display|read) (?:me )?(?:the )?(?:contents of |file )?['"]?([^'"]+)['"]?"#, "cat {0}"),
    (r#"open (?:the file )?['"]?([^'"]+)['"]?"#, "cat {0}"),
    // System
    (r"(?:show|display) (?:me )?(?:the )?(?:current )?(?:directory|folder|location)", "pwd"),
    (r"where am i", "pwd"),
    (r"(?:show|list) (?:running )?processes", "ps"),
    (r"(?:show|display) system (?:info|information|stats)", "top"),
    // Screen
    (r"clear (?:the )?screen", "clear"),
    (r"clean (?:the )?screen", "clear"),
    (r"clean up", "clear"),
    // Help
    (r"(?:show )?help", "help"),
    (r"what (?:can i do|commands are available)", "help"),
];

const BUILTIN_KEYWORDS: &[(&str, &[&str])] = &[
    ("file", &["ls", "cat", "touch", "rm"]),
    ("folder", &["mkdir", "ls", "cd", "rmdir"]),
    ("directory", &["mkdir", "ls", "cd", "rmdir"]),
    ("create", &["mkdir", "touch"]),
    ("delete", &["rm", "rmdir"]),
    ("copy", &["cp"]),
    ("move", &["mv"]),
    ("list", &["ls", "ps"]),
    ("show", &["ls", "cat", "pwd", "ps", "top"]),
    ("all", &["ls -la"]),
    ("files", &["ls", "cat"]),
    ("contents", &["ls", "cat"]),
];

/// Example phrases understood by the built-in catalog
pub const PHRASE_HELP: &str = r#"Natural Language Command Help:

File Operations:
- "create a file called test.txt" -> touch test.txt
- "make a new folder named documents" -> mkdir documents
- "delete the file readme.txt" -> rm readme.txt
- "copy file1.txt into backup" -> cp file1.txt backup/

Navigation:
- "go to the documents folder" -> cd documents
- "go up" -> cd ..
- "go home" -> cd ~

Viewing:
- "list all files" -> ls
- "show me all files" -> ls
- "show the contents of file.txt" -> cat file.txt
- "where am i" -> pwd

System:
- "list running processes" -> ps
- "clear the screen" -> clear

Multi-step commands:
- "create a new folder called test and move file.txt into it"
  -> mkdir test; mv file.txt test/"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_shape() {
        let catalog = RuleCatalog::builtin();
        assert_eq!(catalog.multi_step().len(), 3);
        assert_eq!(catalog.rules().len(), BUILTIN_RULES.len());
        assert_eq!(catalog.rules()[0].template(), "touch {0}");
        assert_eq!(catalog.keyword("copy"), Some(&["cp".to_string()][..]));
        assert!(catalog.keyword("frobnicate").is_none());
    }

    #[test]
    fn test_load_from_yaml() {
        let yaml = r#"
multi_step:
  - pattern: "back up (\\S+) into (\\S+)"
    templates: ["mkdir -p {1}", "cp {0} {1}/"]
rules:
  - pattern: "say (.+)"
    template: "echo {0}"
keywords:
  say: [echo]
"#;
        let catalog = RuleCatalog::from_yaml_str(yaml).unwrap();
        assert_eq!(catalog.multi_step().len(), 1);
        assert_eq!(catalog.multi_step()[0].templates().len(), 2);
        assert_eq!(catalog.rules()[0].template(), "echo {0}");
        assert_eq!(catalog.keyword("say"), Some(&["echo".to_string()][..]));
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let err = RuleCatalog::from_yaml_str("rules:\n  - pattern: \"open (\"\n    template: x\n")
            .unwrap_err();
        assert!(matches!(err, ShellError::InvalidPattern { .. }));
    }

    #[test]
    fn test_missing_rule_file() {
        let err = RuleCatalog::from_yaml_file("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ShellError::Io { .. }));
    }

    #[test]
    fn test_overrides_come_first_and_merge_keywords() {
        let user = RuleCatalog::from_yaml_str(
            "rules:\n  - pattern: \"list all files\"\n    template: \"ls -la\"\nkeywords:\n  copy: [cp, rsync]\n",
        )
        .unwrap();
        let catalog = RuleCatalog::builtin().with_overrides(user);

        assert_eq!(catalog.rules()[0].template(), "ls -la");
        assert_eq!(catalog.rules().len(), BUILTIN_RULES.len() + 1);
        assert_eq!(
            catalog.keyword("copy"),
            Some(&["cp".to_string(), "rsync".to_string()][..])
        );
    }

    #[test]
    fn test_describe_lists_multi_step_first() {
        let lines = RuleCatalog::builtin().describe();
        assert!(lines[0].starts_with("[multi]"));
        assert!(lines[0].ends_with("mkdir {0}; mv {1} {0}/"));
        assert!(lines.last().unwrap().starts_with("[rule]"));
    }
}
