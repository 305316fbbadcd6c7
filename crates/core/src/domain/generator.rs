// Command Generators - strategies turning a matched snippet into a shell command

use crate::domain::error::{DomainError, Result};
use crate::domain::snippet::Snippet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Extra values handed to a generator alongside the snippet and its file path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorContext {
    /// Working directory the snippet was materialized into
    pub run_dir: PathBuf,
    /// Materialized filename without its extension
    pub base_filename: String,
}

/// Produces the shell command for a matched snippet
///
/// Implementations may have side effects (compile a file, read others) before
/// returning. The returned string is spawned as-is: no escaping is applied.
pub trait CommandGenerator: Send + Sync {
    fn generate(&self, snippet: &Snippet, file_path: &Path, ctx: &GeneratorContext)
        -> Result<String>;

    /// Short human-readable description (used in logs and rule listings)
    fn describe(&self) -> String {
        "custom generator".to_string()
    }
}

/// Generator backed by a closure
pub struct FnGenerator<F> {
    f: F,
}

impl<F> CommandGenerator for FnGenerator<F>
where
    F: Fn(&Snippet, &Path, &GeneratorContext) -> Result<String> + Send + Sync,
{
    fn generate(
        &self,
        snippet: &Snippet,
        file_path: &Path,
        ctx: &GeneratorContext,
    ) -> Result<String> {
        (self.f)(snippet, file_path, ctx)
    }
}

/// Wrap a closure as a shareable generator
///
/// # Example
/// ```
/// use snippet_run_core::domain::generator;
///
/// let bash = generator::from_fn(|_, path, _| Ok(format!("bash \"{}\"", path.display())));
/// # let _ = bash;
/// ```
pub fn from_fn<F>(f: F) -> Arc<dyn CommandGenerator>
where
    F: Fn(&Snippet, &Path, &GeneratorContext) -> Result<String> + Send + Sync + 'static,
{
    Arc::new(FnGenerator { f })
}

/// Values a template may reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    FilePath,
    FileName,
    FileType,
    RunDir,
    BaseFilename,
    Channel,
}

impl Placeholder {
    pub const ALL: [Placeholder; 6] = [
        Placeholder::FilePath,
        Placeholder::FileName,
        Placeholder::FileType,
        Placeholder::RunDir,
        Placeholder::BaseFilename,
        Placeholder::Channel,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Placeholder::FilePath => "filepath",
            Placeholder::FileName => "filename",
            Placeholder::FileType => "filetype",
            Placeholder::RunDir => "run_dir",
            Placeholder::BaseFilename => "base_filename",
            Placeholder::Channel => "channel",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Value(Placeholder),
}

/// Generator rendering a command template such as `bash "{filepath}"`
///
/// `{{` and `}}` produce literal braces (so `${HOME}` is written `${{HOME}}`).
/// Unknown placeholders are refused when the template is parsed.
#[derive(Debug, Clone)]
pub struct TemplateGenerator {
    template: String,
    segments: Vec<Segment>,
}

impl TemplateGenerator {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        let segments = parse_template(&template)?;
        Ok(Self { template, segments })
    }

    pub fn render(&self, snippet: &Snippet, file_path: &Path, ctx: &GeneratorContext) -> String {
        let mut out = String::with_capacity(self.template.len() + 64);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Value(Placeholder::FilePath) => {
                    out.push_str(&file_path.to_string_lossy())
                }
                Segment::Value(Placeholder::FileName) => out.push_str(snippet.filename()),
                Segment::Value(Placeholder::FileType) => out.push_str(snippet.filetype()),
                Segment::Value(Placeholder::RunDir) => out.push_str(&ctx.run_dir.to_string_lossy()),
                Segment::Value(Placeholder::BaseFilename) => out.push_str(&ctx.base_filename),
                Segment::Value(Placeholder::Channel) => out.push_str(&snippet.channel),
            }
        }
        out
    }
}

impl CommandGenerator for TemplateGenerator {
    fn generate(
        &self,
        snippet: &Snippet,
        file_path: &Path,
        ctx: &GeneratorContext,
    ) -> Result<String> {
        Ok(self.render(snippet, file_path, ctx))
    }

    fn describe(&self) -> String {
        self.template.clone()
    }
}

fn parse_template(template: &str) -> Result<Vec<Segment>> {
    let invalid = |reason: String| DomainError::InvalidTemplate {
        template: template.to_string(),
        reason,
    };

    if template.trim().is_empty() {
        return Err(invalid("template is empty".to_string()));
    }

    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => return Err(invalid(format!("unclosed placeholder '{{{}'", name))),
                    }
                }
                let placeholder = Placeholder::from_name(name.trim()).ok_or_else(|| {
                    let known: Vec<&str> = Placeholder::ALL.iter().map(|p| p.name()).collect();
                    invalid(format!(
                        "unknown placeholder '{{{}}}' (known: {})",
                        name,
                        known.join(", ")
                    ))
                })?;
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Value(placeholder));
            }
            '}' => return Err(invalid("unmatched '}' (write '}}' for a literal brace)".to_string())),
            other => literal.push(other),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> GeneratorContext {
        GeneratorContext {
            run_dir: PathBuf::from("/home/me/.snippet-run/run"),
            base_filename: "main".to_string(),
        }
    }

    #[test]
    fn test_template_renders_all_placeholders() {
        let generator = TemplateGenerator::new(
            "cc \"{filepath}\" -o \"{run_dir}/{base_filename}\" # {filename} {filetype} {channel}",
        )
        .unwrap();
        let snippet = Snippet::new("command_7", "main.c", "c", "int main(){}");

        let command = generator
            .generate(&snippet, Path::new("/home/me/.snippet-run/run/main.c"), &ctx())
            .unwrap();

        assert_eq!(
            command,
            "cc \"/home/me/.snippet-run/run/main.c\" -o \"/home/me/.snippet-run/run/main\" # main.c c command_7"
        );
    }

    #[test]
    fn test_template_escaped_braces() {
        let generator = TemplateGenerator::new("echo ${{HOME}} && sh {filepath}").unwrap();
        let snippet = Snippet::new("c", "a.sh", "shell", "");
        let command = generator.render(&snippet, Path::new("/tmp/a.sh"), &ctx());
        assert_eq!(command, "echo ${HOME} && sh /tmp/a.sh");
    }

    #[test]
    fn test_template_rejects_unknown_placeholder() {
        let err = TemplateGenerator::new("node {path}").unwrap_err();
        assert!(err.to_string().contains("unknown placeholder"));
    }

    #[test]
    fn test_template_rejects_unclosed_placeholder() {
        assert!(TemplateGenerator::new("node {filepath").is_err());
        assert!(TemplateGenerator::new("node filepath}").is_err());
        assert!(TemplateGenerator::new("   ").is_err());
    }

    #[test]
    fn test_fn_generator_passes_arguments_through() {
        let generator = from_fn(|snippet, path, ctx| {
            Ok(format!(
                "{}|{}|{}",
                snippet.filename(),
                path.display(),
                ctx.base_filename
            ))
        });
        let snippet = Snippet::new("c", "main.rs", "rust", "");
        let command = generator
            .generate(&snippet, Path::new("/run/main.rs"), &ctx())
            .unwrap();
        assert_eq!(command, "main.rs|/run/main.rs|main");
        assert_eq!(generator.describe(), "custom generator");
    }
}
