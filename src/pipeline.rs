//! End-to-end diagram generation.
//!
//! Order matters: the output location is proven safe before any code is
//! rendered, and rendered code only reaches the interpreter through the
//! executor, which validates it again.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::confine::{OutputGuard, sanitize_display_name, sanitize_file_stem};
use crate::error::{Error, Result};
use crate::sandbox::{Executor, Spawner};
use crate::templates::{self, Pattern};

/// Extension of the file the templates produce.
pub const OUTPUT_EXTENSION: &str = "svg";

/// Raw, unsanitized user input for one diagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub name: String,
    pub pattern: String,
    pub output: String,
}

impl GenerationRequest {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        pattern: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            output: output.into(),
        }
    }
}

/// A diagram that was generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    /// File name the script was asked to write, e.g. `architecture.svg`.
    pub output_file: String,
    /// Whatever the script printed.
    pub stdout: String,
}

/// Sanitizes the request, confines the output, renders and runs the template.
///
/// # Errors
///
/// - [`Error::UnknownPattern`] if the pattern id is not in the catalog
/// - [`Error::EmptyOutputName`] if nothing usable is left of the output name
/// - [`Error::Path`] if the output would land outside the allowed roots
/// - [`Error::Template`] if the template cannot be rendered
/// - [`Error::Execution`] if validation, spawning or the script itself failed
#[instrument(skip(executor), fields(pattern = %request.pattern))]
pub fn generate<S: Spawner>(
    request: &GenerationRequest,
    executor: &Executor<S>,
) -> Result<Generated> {
    let pattern = Pattern::lookup(&request.pattern).ok_or_else(|| Error::UnknownPattern {
        pattern: request.pattern.clone(),
        available: Pattern::available(),
    })?;

    let name = sanitize_display_name(&request.name);
    let stem = sanitize_file_stem(&request.output);
    if stem.is_empty() || stem == "." {
        return Err(Error::EmptyOutputName {
            raw: request.output.clone(),
        });
    }
    let output_file = format!("{stem}.{OUTPUT_EXTENSION}");

    // The script writes relative to the child's working directory.
    let base = executor
        .config()
        .working_dir
        .clone()
        .unwrap_or_default();
    let guard = OutputGuard::new();
    for candidate in [stem.as_str(), output_file.as_str()] {
        let resolved = guard.validate(&join_relative(&base, candidate))?;
        debug!(resolved = %resolved.display(), "Output path allowed");
    }

    let code = templates::render(pattern, &name, &stem)?;
    debug!(bytes = code.len(), "Template rendered");

    let stdout = executor
        .execute(&code)
        .into_result()
        .map_err(Error::Execution)?;

    info!(output = %output_file, "Diagram generated");
    Ok(Generated {
        output_file,
        stdout,
    })
}

fn join_relative(base: &Path, name: &str) -> PathBuf {
    if base.as_os_str().is_empty() {
        PathBuf::from(name)
    } else {
        base.join(name)
    }
}

/// Resolves an interactive pattern choice: a 1-based number, or a name where
/// case is ignored and spaces stand for hyphens.
///
/// # Errors
///
/// Returns [`Error::UnknownPattern`] if the choice matches nothing.
pub fn parse_pattern_choice(choice: &str) -> Result<&'static Pattern> {
    let choice = choice.trim();
    let found = if !choice.is_empty() && choice.bytes().all(|b| b.is_ascii_digit()) {
        choice.parse().ok().and_then(Pattern::from_index)
    } else {
        Pattern::lookup(&choice.to_lowercase().replace(' ', "-"))
    };

    found.ok_or_else(|| Error::UnknownPattern {
        pattern: choice.to_string(),
        available: Pattern::available(),
    })
}

/// Drops a trailing `.svg` or `.png` the user typed out of habit.
#[must_use]
pub fn strip_image_extension(output: &str) -> &str {
    output
        .strip_suffix(".svg")
        .or_else(|| output.strip_suffix(".png"))
        .unwrap_or(output)
}
