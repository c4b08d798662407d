//! Configuration for the sandboxed executor.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use crate::policy::DEFAULT_TIMEOUT;

/// Interpreter looked up on `PATH` when none is configured.
pub const DEFAULT_INTERPRETER: &str = "python3";

/// Parent environment variables passed through to the child.
///
/// Search paths, home and temp directories. Everything else is withheld.
pub const DEFAULT_ENV_ALLOWLIST: &[&str] = &[
    "PATH",
    "PYTHONPATH",
    "HOME",
    "TEMP",
    "TMP",
    "TMPDIR",
    "USERPROFILE",
];

/// Configuration for an [`Executor`](super::Executor).
///
/// # Example
///
/// ```
/// use diagram_guard::sandbox::ExecutorConfig;
/// use std::time::Duration;
///
/// let config = ExecutorConfig::default()
///     .with_timeout(Duration::from_secs(10))
///     .with_interpreter("/usr/bin/python3")
///     .with_working_dir("/tmp");
/// assert_eq!(config.timeout, Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Wall-clock budget for one run.
    pub timeout: Duration,

    /// Interpreter binary the script is handed to.
    pub interpreter: PathBuf,

    /// Child working directory. `None` inherits the invoking process's.
    pub working_dir: Option<PathBuf>,

    /// Names of parent environment variables the child may see.
    pub env_allowlist: Vec<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            interpreter: which::which(DEFAULT_INTERPRETER)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_INTERPRETER)),
            working_dir: None,
            env_allowlist: DEFAULT_ENV_ALLOWLIST
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
        }
    }
}

impl ExecutorConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the wall-clock budget.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the interpreter binary.
    #[must_use]
    pub fn with_interpreter(mut self, interpreter: impl Into<PathBuf>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Sets the child working directory.
    #[must_use]
    pub fn with_working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(path.into());
        self
    }

    /// Replaces the environment allow-list.
    #[must_use]
    pub fn with_env_allowlist<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.env_allowlist = names.into_iter().map(Into::into).collect();
        self
    }

    /// Builds the child environment from `lookup`, which is normally
    /// [`std::env::var_os`]. Names the parent does not define are skipped
    /// rather than set empty.
    pub fn child_env<F>(&self, lookup: F) -> Vec<(String, OsString)>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        self.env_allowlist
            .iter()
            .filter_map(|name| lookup(name).map(|value| (name.clone(), value)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExecutorConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(config.working_dir.is_none());
        assert_eq!(config.env_allowlist.len(), DEFAULT_ENV_ALLOWLIST.len());
        assert!(
            config.interpreter.ends_with(DEFAULT_INTERPRETER),
            "unexpected interpreter: {}",
            config.interpreter.display()
        );
    }

    #[test]
    fn test_builder_chain() {
        let config = ExecutorConfig::new()
            .with_timeout(Duration::from_millis(250))
            .with_interpreter("/opt/python/bin/python3")
            .with_working_dir("/tmp")
            .with_env_allowlist(["PATH"]);

        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.interpreter, PathBuf::from("/opt/python/bin/python3"));
        assert_eq!(config.working_dir, Some(PathBuf::from("/tmp")));
        assert_eq!(config.env_allowlist, vec!["PATH".to_string()]);
    }

    #[test]
    fn test_child_env_withholds_everything_else() {
        let config = ExecutorConfig::default();
        let parent = |name: &str| match name {
            "PATH" => Some(OsString::from("/usr/bin")),
            "HOME" => Some(OsString::from("/home/someone")),
            "AWS_SECRET_ACCESS_KEY" => Some(OsString::from("hunter2")),
            _ => None,
        };

        let env = config.child_env(parent);
        assert_eq!(
            env,
            vec![
                ("PATH".to_string(), OsString::from("/usr/bin")),
                ("HOME".to_string(), OsString::from("/home/someone")),
            ]
        );
    }

    #[test]
    fn test_child_env_omits_unset_names() {
        let config = ExecutorConfig::default();
        let env = config.child_env(|_| None);
        assert!(env.is_empty());
    }
}
