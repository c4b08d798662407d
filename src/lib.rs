//! Diagram Guard - guarded execution of template-generated diagram scripts.
//!
//! Scripts are rendered from built-in architecture templates with a
//! user-supplied title and output name, then run by a Python interpreter.
//! Between those two steps sit the guards:
//!
//! - [`confine`] sanitizes the user strings and keeps the output file under
//!   an allowed directory
//! - [`validator`] parses the script and rejects imports, calls and attribute
//!   accesses outside the compiled-in [`policy`]
//! - [`sandbox`] re-validates and runs the script in a scrubbed, time-bounded
//!   child process, removing the temporary script afterwards
//!
//! # Example
//!
//! ```no_run
//! use diagram_guard::pipeline::{GenerationRequest, generate};
//! use diagram_guard::sandbox::Executor;
//!
//! fn main() -> miette::Result<()> {
//!     let request = GenerationRequest::new("Customer Portal", "api-led", "customer-portal");
//!     let generated = generate(&request, &Executor::default())?;
//!     println!("Generated: {}", generated.output_file);
//!     Ok(())
//! }
//! ```

pub mod confine;
pub mod error;
pub mod pipeline;
pub mod policy;
pub mod sandbox;
pub mod templates;
pub mod validator;

// Re-export commonly used types
pub use confine::{sanitize_display_name, sanitize_file_stem, validate_output_path};
pub use error::{Error, ExecutionFailure, PathViolation, Result};
pub use sandbox::{ExecutionResult, Executor, ExecutorConfig, execute};
pub use validator::{ValidationResult, Violation, ViolationKind, validate};
