/// Compiler driver that bundles template files into one JavaScript module

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use regex::Regex;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use crate::error::{CompileError, Result};
use crate::naming::template_name_from_path;
use crate::runtime::{self, RuntimeFeatures};
use crate::template::{compile_template, CompiledTemplate, TemplateOptions};

/// A template compiled into the bundle
#[derive(Debug, Clone)]
pub struct BundledTemplate {
    /// Registry name
    pub name: String,
    /// File the template was read from
    pub source_file: PathBuf,
    pub template: CompiledTemplate,
}

/// Compilation output structure
#[derive(Debug, Clone)]
pub struct CompileOutput {
    /// Where the bundle goes; unknown when several inputs have no `-o`
    pub output_path: Option<PathBuf>,
    /// Generated bundle
    pub javascript: String,
    pub templates: Vec<BundledTemplate>,
}

/// Options for compilation
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Template files and directories
    pub inputs: Vec<PathBuf>,
    /// Output file (optional for a single input)
    pub output: Option<PathBuf>,
    /// Only compile files whose path matches this regex
    pub pattern: Option<String>,
    /// Leave the render delegate and shared capabilities out of the bundle
    pub standalone: bool,
    /// Log what each template needs from its caller
    pub verbose: bool,
    pub template: TemplateOptions,
}

impl CompileOptions {
    pub fn new<I, P>(inputs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            output: None,
            pattern: None,
            standalone: false,
            verbose: false,
            template: TemplateOptions::default(),
        }
    }

    pub fn output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn standalone(mut self, standalone: bool) -> Self {
        self.standalone = standalone;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn template_options(mut self, template: TemplateOptions) -> Self {
        self.template = template;
        self
    }
}

/// The lather compiler
pub struct Compiler {
    options: CompileOptions,
}

impl Compiler {
    /// Create a new compiler with the given options
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    /// Compile every input into a bundle without touching the output file
    pub fn compile(&self) -> Result<CompileOutput> {
        let pattern = self.options.pattern.as_deref().map(Regex::new).transpose()?;

        let sources = self.collect_sources(pattern.as_ref())?;
        if sources.is_empty() {
            return Err(CompileError::NoTemplates);
        }

        let mut templates = Vec::with_capacity(sources.len());
        for (name, source_file) in sources {
            let source = fs::read_to_string(&source_file)?;
            let template = compile_template(&source, &self.options.template)
                .map_err(|e| e.in_file(&source_file))?;
            debug!("Compiled {} as {}", source_file.display(), name);
            if self.options.verbose {
                info!(
                    "{}: variables [{}], helpers [{}]{}",
                    name,
                    template.free_variables.join(", "),
                    template.helpers.join(", "),
                    template.extends.as_deref().map(|p| format!(", extends {}", p)).unwrap_or_default()
                );
            }
            templates.push(BundledTemplate {
                name,
                source_file,
                template,
            });
        }

        let javascript = self.bundle(&templates)?;
        Ok(CompileOutput {
            output_path: self.output_path(),
            javascript,
            templates,
        })
    }

    /// Compile and write the bundle to its output path
    pub fn run(&self) -> Result<CompileOutput> {
        let output_path = self
            .output_path()
            .ok_or(CompileError::NoOutput(self.options.inputs.len()))?;
        let output = self.compile()?;
        fs::write(&output_path, &output.javascript)?;
        info!(
            "Wrote {} template(s) to {}",
            output.templates.len(),
            output_path.display()
        );
        Ok(output)
    }

    /// Explicit output, or the single input with a `.js` extension
    fn output_path(&self) -> Option<PathBuf> {
        if let Some(output) = &self.options.output {
            return Some(output.clone());
        }
        match self.options.inputs.as_slice() {
            [input] => Some(input.with_extension("js")),
            _ => None,
        }
    }

    /// Template names and files in processing order
    fn collect_sources(&self, pattern: Option<&Regex>) -> Result<Vec<(String, PathBuf)>> {
        let mut sources = Vec::new();
        let mut missing = Vec::new();

        for input in &self.options.inputs {
            if !input.exists() {
                warn!("{} does not exist, skipping", input.display());
                missing.push(input.clone());
                continue;
            }

            if input.is_dir() {
                self.collect_directory(input, pattern, &mut sources)?;
            } else if matches_pattern(input, pattern) {
                let name = template_name_from_path(&input.to_string_lossy(), true);
                sources.push((name, input.clone()));
            }
        }

        if missing.len() == self.options.inputs.len() {
            if let Some(first) = missing.into_iter().next() {
                return Err(CompileError::FileNotFound(first));
            }
        }
        Ok(sources)
    }

    /// Files directly in `dir` and one subdirectory down; the latter are
    /// named `subdir/name`.
    fn collect_directory(
        &self,
        dir: &Path,
        pattern: Option<&Regex>,
        sources: &mut Vec<(String, PathBuf)>,
    ) -> Result<()> {
        let walker = WalkDir::new(dir).min_depth(1).max_depth(2).sort_by_file_name();
        for entry in walker {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() || !matches_pattern(entry.path(), pattern) {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy();
            let mut name = template_name_from_path(&file_name, true);
            if entry.depth() == 2 {
                let subdir = entry
                    .path()
                    .parent()
                    .and_then(Path::file_name)
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                name = format!("{}/{}", subdir, name);
            }
            sources.push((name, entry.into_path()));
        }
        Ok(())
    }

    fn bundle(&self, templates: &[BundledTemplate]) -> Result<String> {
        let features = RuntimeFeatures {
            standalone: self.options.standalone,
            escape: templates.iter().any(|t| t.template.uses_escape),
            helpers: templates.iter().any(|t| !t.template.helpers.is_empty()),
        };
        debug!("Bundling {} template(s) with {:?}", templates.len(), features);

        let mut out = runtime::prelude(features);
        for bundled in templates {
            out.push('\n');
            out.push_str(&runtime::wrap_template(&bundled.name, &bundled.template.code)?);
        }
        out.push('\n');
        out.push_str(&runtime::epilogue());
        Ok(runtime::strip_trailing_spaces(&out))
    }
}

fn matches_pattern(path: &Path, pattern: Option<&Regex>) -> bool {
    let Some(pattern) = pattern else {
        return true;
    };
    let matched = pattern.is_match(&path.to_string_lossy());
    if !matched {
        warn!("{} does not match pattern \"{}\", skipping", path.display(), pattern);
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_options_builder() {
        let opts = CompileOptions::new(["views"])
            .output("bundle.js")
            .pattern(r"\.html$")
            .standalone(true)
            .verbose(true);

        assert_eq!(opts.inputs, vec![PathBuf::from("views")]);
        assert_eq!(opts.output, Some(PathBuf::from("bundle.js")));
        assert_eq!(opts.pattern.as_deref(), Some(r"\.html$"));
        assert!(opts.standalone);
        assert!(opts.verbose);
    }

    #[test]
    fn test_output_path_defaults_for_single_input() {
        let compiler = Compiler::new(CompileOptions::new(["views/home.html"]));
        assert_eq!(compiler.output_path(), Some(PathBuf::from("views/home.js")));

        let compiler = Compiler::new(CompileOptions::new(["views"]));
        assert_eq!(compiler.output_path(), Some(PathBuf::from("views.js")));
    }

    #[test]
    fn test_several_inputs_need_output_to_run() {
        let compiler = Compiler::new(CompileOptions::new(["a.html", "b.html"]));
        assert_eq!(compiler.output_path(), None);
        assert!(matches!(compiler.run(), Err(CompileError::NoOutput(2))));

        let compiler = Compiler::new(CompileOptions::new(["a.html", "b.html"]).output("all.js"));
        assert_eq!(compiler.output_path(), Some(PathBuf::from("all.js")));
    }

    #[test]
    fn test_invalid_pattern() {
        let compiler = Compiler::new(CompileOptions::new(["a.html"]).pattern("("));
        assert!(matches!(compiler.compile(), Err(CompileError::InvalidPattern(_))));
    }
}
