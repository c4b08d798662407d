//! Sandboxed execution of validated Python scripts.
//!
//! An [`Executor`] re-validates the script, writes it to a uniquely named
//! temporary file, and runs the interpreter on it with a scrubbed environment
//! and a wall-clock budget. The file is removed however the run ends.
//!
//! # Isolation
//!
//! This is a weak boundary: the child runs as the invoking user, sees the
//! host filesystem and network, and has no memory or CPU ceiling. What it
//! does provide is default-deny environment inheritance, a hard time limit
//! enforced on the whole process group, and static rejection of scripts that
//! reach beyond the import allow-list. Anything needing a stronger boundary
//! should add OS-level confinement around the spawned process.
//!
//! # Example
//!
//! ```no_run
//! use diagram_guard::sandbox::{ExecutorConfig, Executor};
//! use std::time::Duration;
//!
//! let executor = Executor::new(ExecutorConfig::default().with_timeout(Duration::from_secs(5)));
//! let result = executor.execute("import os\n");
//!
//! assert!(!result.success());
//! println!("{}", result.diagnostic().unwrap_or_default());
//! ```

mod config;
mod executor;

pub use config::{DEFAULT_ENV_ALLOWLIST, DEFAULT_INTERPRETER, ExecutorConfig};
pub use executor::{ExecutionResult, Executor, SCRIPT_PREFIX, Spawner, SystemSpawner, execute};
