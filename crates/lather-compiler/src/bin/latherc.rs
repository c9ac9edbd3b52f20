/// Lather compiler CLI

use std::path::PathBuf;
use anyhow::Context;
use clap::Parser;
use lather_compiler::{Compiler, CompileOptions, TemplateOptions};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "latherc")]
#[command(about = "Lather compiler - bundles text templates into JavaScript render procedures")]
#[command(version)]
struct Args {
    /// Template files or directories
    #[arg(value_name = "PATH", required = true)]
    inputs: Vec<PathBuf>,

    /// Output file for the bundle
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Only compile files whose path matches this regex
    #[arg(long, value_name = "REGEX")]
    matches: Option<String>,

    /// Leave the render delegate, escape and helpers out of the bundle
    #[arg(long, alias = "forever-alone")]
    standalone: bool,

    /// Call undeclared functions directly instead of through helpers
    #[arg(long)]
    bare_calls: bool,

    /// Print the bundle to stdout instead of writing it
    #[arg(long)]
    print: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut options = CompileOptions::new(args.inputs)
        .standalone(args.standalone)
        .verbose(args.verbose)
        .template_options(TemplateOptions::default().bare_calls(args.bare_calls));

    if let Some(output) = args.output {
        options = options.output(output);
    }
    if let Some(pattern) = args.matches {
        options = options.pattern(pattern);
    }

    let compiler = Compiler::new(options);

    if args.print {
        let output = compiler.compile().context("Compilation failed")?;
        print!("{}", output.javascript);
    } else {
        compiler.run().context("Compilation failed")?;
    }
    Ok(())
}
