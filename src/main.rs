//! Diagram Guard - Entry Point
//!
//! Generates architecture diagrams from the built-in templates, either from
//! flags or through interactive prompts.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use miette::{IntoDiagnostic, Result};
use tracing::{Level, debug};
use tracing_subscriber::{EnvFilter, fmt};

use diagram_guard::pipeline::{
    GenerationRequest, generate, parse_pattern_choice, strip_image_extension,
};
use diagram_guard::policy::DEFAULT_TIMEOUT;
use diagram_guard::sandbox::{Executor, ExecutorConfig};
use diagram_guard::templates::Pattern;

const DEFAULT_TITLE: &str = "Azure Architecture";
const DEFAULT_OUTPUT: &str = "architecture";

/// Generate Azure architecture diagrams from vetted templates.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about = None,
    after_help = "Examples:
  diagram-guard --interactive
  diagram-guard --list
  diagram-guard --name \"Customer Portal\" --pattern api-led --output customer-portal
  diagram-guard -n \"Data Platform\" -p data-pipeline -o data-arch"
)]
struct Args {
    /// Interactive mode
    #[arg(short, long)]
    interactive: bool,

    /// List available patterns
    #[arg(short, long)]
    list: bool,

    /// Diagram title
    #[arg(short, long)]
    name: Option<String>,

    /// Pattern name (e.g., api-led, hybrid, event-driven)
    #[arg(short, long)]
    pattern: Option<String>,

    /// Output filename (without extension)
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    output: String,

    /// Execution budget in seconds
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout: u64,

    /// Python interpreter to run diagrams with
    #[arg(long, value_name = "PATH")]
    python: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the listing and the result line
    let filter = if args.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    debug!("Diagram Guard v{}", env!("CARGO_PKG_VERSION"));

    let mut config = ExecutorConfig::default().with_timeout(Duration::from_secs(args.timeout));
    if let Some(python) = args.python {
        config = config.with_interpreter(python);
    }
    debug!(interpreter = %config.interpreter.display(), "Executor configured");
    let executor = Executor::new(config);

    if args.list {
        list_patterns();
        return Ok(());
    }

    if args.interactive {
        return interactive(&executor);
    }

    match (args.name, args.pattern) {
        (Some(name), Some(pattern)) => {
            run(&GenerationRequest::new(name, pattern, args.output), &executor)
        }
        _ => Args::command().print_help().into_diagnostic(),
    }
}

fn run(request: &GenerationRequest, executor: &Executor) -> Result<()> {
    let generated = generate(request, executor)?;
    if !generated.stdout.is_empty() {
        print!("{}", generated.stdout);
    }
    println!("Generated: {}", generated.output_file);
    Ok(())
}

fn list_patterns() {
    println!("\n Available Architecture Patterns");
    println!("{}", "=".repeat(50));
    for pattern in Pattern::all() {
        println!("\n  {}", pattern.id());
        println!("    {}", pattern.description());
    }
    println!();
}

fn interactive(executor: &Executor) -> Result<()> {
    println!("\n Azure Architecture Diagram Generator");
    println!("{}", "=".repeat(50));

    println!("\nAvailable patterns:");
    for (i, pattern) in Pattern::all().iter().enumerate() {
        println!("  {}. {}: {}", i + 1, pattern.id(), pattern.description());
    }
    println!();

    let choice = prompt("Select pattern (number or name): ")?;
    let pattern = parse_pattern_choice(&choice)?;

    let name = prompt(&format!("Diagram title [{DEFAULT_TITLE}]: "))?;
    let name = if name.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        name
    };

    let output = prompt(&format!("Output filename [{DEFAULT_OUTPUT}]: "))?;
    let output = if output.is_empty() {
        DEFAULT_OUTPUT
    } else {
        strip_image_extension(&output)
    };

    println!("\nGenerating {} diagram: '{name}'...", pattern.id());
    run(&GenerationRequest::new(name.as_str(), pattern.id(), output), executor)
}

/// Prints `label` and reads one trimmed line from stdin.
fn prompt(label: &str) -> Result<String> {
    let mut stdout = io::stdout();
    stdout.write_all(label.as_bytes()).into_diagnostic()?;
    stdout.flush().into_diagnostic()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).into_diagnostic()?;
    Ok(line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_defaults_to_policy_budget() {
        let args = Args::try_parse_from(["diagram-guard"]).expect("no flag is required");
        assert_eq!(Duration::from_secs(args.timeout), DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_timeout_flag_overrides_default() {
        let args = Args::try_parse_from(["diagram-guard", "--timeout", "5"]).expect("valid flags");
        assert_eq!(args.timeout, 5);
    }
}
