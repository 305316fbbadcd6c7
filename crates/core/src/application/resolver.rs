// Command Resolver - picks the rule for a snippet and builds its command

use crate::application::constants::NO_RULE_EXIT_CODE;
use crate::domain::{GeneratorContext, RuleSet, Snippet};
use crate::error::{AppError, Result};
use crate::port::SnippetWorkspace;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Per-invocation values computed once a rule matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    pub file_path: PathBuf,
    pub run_dir: PathBuf,
    pub base_filename: String,
}

/// Outcome of resolving a snippet
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Shell command to spawn
    pub command: String,
    /// Label of the matched rule, None for the fallback
    pub rule: Option<String>,
    /// Working file details, None for the fallback
    pub context: Option<ExecutionContext>,
}

impl Resolution {
    pub fn is_fallback(&self) -> bool {
        self.rule.is_none()
    }
}

/// Resolves snippets against an immutable rule set
pub struct CommandResolver {
    rules: Arc<RuleSet>,
    workspace: Arc<dyn SnippetWorkspace>,
    user_config_path: PathBuf,
}

impl CommandResolver {
    /// Create a resolver
    ///
    /// # Arguments
    /// * `rules` - Ordered rules, user rules first
    /// * `workspace` - Where matched snippets are written
    /// * `user_config_path` - Rule file named in the "no rule matched" message
    pub fn new(
        rules: Arc<RuleSet>,
        workspace: Arc<dyn SnippetWorkspace>,
        user_config_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            rules,
            workspace,
            user_config_path: user_config_path.into(),
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn run_dir(&self) -> &Path {
        self.workspace.run_dir()
    }

    /// Select the first matching rule and build its command
    ///
    /// Blocking (writes the working file and runs the generator).
    ///
    /// # Errors
    /// - AppError::Materialization if the working file cannot be written
    /// - AppError::Generator if the rule's generator fails
    pub fn resolve(&self, snippet: &Snippet) -> Result<Resolution> {
        let Some(rule) = self.rules.first_match(snippet) else {
            info!(
                filename = %snippet.filename(),
                rules = self.rules.len(),
                "No rule matched, using fallback command"
            );
            return Ok(Resolution {
                command: fallback_command(snippet.filename(), &self.user_config_path),
                rule: None,
                context: None,
            });
        };

        info!(rule = %rule.label(), "Matched rule");
        debug!(rule = ?rule, "Rule details");

        let file_path = self.workspace.materialize(snippet)?;
        let run_dir = file_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.workspace.run_dir().to_path_buf());
        let base_filename = file_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let ctx = GeneratorContext {
            run_dir: run_dir.clone(),
            base_filename: base_filename.clone(),
        };
        let command = rule
            .generator()
            .generate(snippet, &file_path, &ctx)
            .map_err(|e| AppError::Generator(format!("rule '{}': {}", rule.label(), e)))?;

        debug!(command = %command, "Generated command");

        Ok(Resolution {
            command,
            rule: Some(rule.label().to_string()),
            context: Some(ExecutionContext {
                file_path,
                run_dir,
                base_filename,
            }),
        })
    }
}

/// Synthetic command reporting that no rule matched
///
/// Prints the message and exits with `NO_RULE_EXIT_CODE`.
pub fn fallback_command(filename: &str, user_config_path: &Path) -> String {
    let message = format!(
        "Error: Could not find a rule that matches filename '{}'. Please add one to: {}.",
        filename,
        user_config_path.display()
    );

    #[cfg(windows)]
    {
        format!("echo {} & exit /b {}", cmd_escape(&message), NO_RULE_EXIT_CODE)
    }

    #[cfg(not(windows))]
    {
        format!(
            "printf '%s\\n' {} && exit {}",
            shell_quote(&message),
            NO_RULE_EXIT_CODE
        )
    }
}

/// Quote a value as a single POSIX shell word
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(windows)]
fn cmd_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '^' | '&' | '|' | '<' | '>' | '(' | ')' | '%' | '!' | '"') {
            out.push('^');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::generator;
    use crate::domain::{Matcher, Rule};
    use crate::port::workspace::mocks::InMemoryWorkspace;

    fn resolver_with(rules: Vec<Rule>, workspace: Arc<InMemoryWorkspace>) -> CommandResolver {
        CommandResolver::new(
            Arc::new(RuleSet::new(rules)),
            workspace,
            "/home/me/.snippet-run/rules.toml",
        )
    }

    fn bash_rule() -> Rule {
        Rule::new(
            r"\.sh$",
            Matcher::pattern(r"\.sh$").unwrap(),
            generator::from_fn(|_, path, _| Ok(format!("bash {}", path.display()))),
        )
    }

    #[test]
    fn test_match_materializes_and_generates() {
        let workspace = Arc::new(InMemoryWorkspace::new("/run"));
        let resolver = resolver_with(vec![bash_rule()], workspace.clone());
        let snippet = Snippet::new("c1", "hello.sh", "shell", "echo hi");

        let resolution = resolver.resolve(&snippet).unwrap();

        assert_eq!(resolution.command, "bash /run/hello.sh");
        assert_eq!(resolution.rule.as_deref(), Some(r"\.sh$"));
        let ctx = resolution.context.unwrap();
        assert_eq!(ctx.base_filename, "hello");
        assert_eq!(ctx.run_dir, PathBuf::from("/run"));
        assert_eq!(
            workspace.content_of(Path::new("/run/hello.sh")).as_deref(),
            Some("echo hi")
        );
    }

    #[test]
    fn test_generator_receives_context() {
        let workspace = Arc::new(InMemoryWorkspace::new("/run"));
        let rule = Rule::new(
            "c",
            Matcher::pattern(r"\.c$").unwrap(),
            generator::from_fn(|_, path, ctx| {
                Ok(format!(
                    "cc {} -o {}/{}",
                    path.display(),
                    ctx.run_dir.display(),
                    ctx.base_filename
                ))
            }),
        );
        let resolver = resolver_with(vec![rule], workspace);

        let resolution = resolver
            .resolve(&Snippet::new("c1", "main.c", "c", "int main(){}"))
            .unwrap();
        assert_eq!(resolution.command, "cc /run/main.c -o /run/main");
    }

    #[test]
    fn test_no_match_returns_fallback_without_writing() {
        let workspace = Arc::new(InMemoryWorkspace::new("/run"));
        let resolver = resolver_with(vec![bash_rule()], workspace.clone());

        let resolution = resolver
            .resolve(&Snippet::new("c1", "notes.txt", "text", "hello"))
            .unwrap();

        assert!(resolution.is_fallback());
        assert!(resolution.context.is_none());
        assert!(resolution.command.contains("notes.txt"));
        assert!(resolution.command.contains("/home/me/.snippet-run/rules.toml"));
        assert!(resolution
            .command
            .ends_with(&format!("exit {}", NO_RULE_EXIT_CODE)));
        assert_eq!(workspace.write_count(), 0);
    }

    #[test]
    fn test_materialization_failure_is_fatal() {
        let workspace = Arc::new(InMemoryWorkspace::failing("/run", "disk full"));
        let resolver = resolver_with(vec![bash_rule()], workspace);

        let err = resolver
            .resolve(&Snippet::new("c1", "hello.sh", "shell", "echo hi"))
            .unwrap_err();
        assert!(matches!(err, AppError::Materialization(_)));
    }

    #[test]
    fn test_generator_failure_names_rule() {
        let workspace = Arc::new(InMemoryWorkspace::new("/run"));
        let rule = Rule::new(
            "nvm",
            Matcher::pattern(r"\.js$").unwrap(),
            generator::from_fn(|_, _, _| {
                Err(crate::domain::DomainError::GeneratorFailed(
                    "missing //nvm: directive".to_string(),
                ))
            }),
        );
        let resolver = resolver_with(vec![rule], workspace);

        let err = resolver
            .resolve(&Snippet::new("c1", "a.js", "javascript", ""))
            .unwrap_err();
        assert!(matches!(err, AppError::Generator(_)));
        assert!(err.to_string().contains("nvm"));
    }

    #[test]
    fn test_shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote("$(rm -rf ~)"), "'$(rm -rf ~)'");
    }
}
