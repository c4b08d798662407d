//! Output location policy.
//!
//! A candidate path is resolved to an absolute form before it is compared
//! with the allowed roots: relative paths are joined onto the working
//! directory, `..` is applied, and symbolic links are followed. The output
//! file usually does not exist yet, so resolution is lenient: the longest
//! existing prefix is canonicalized by the OS and the remainder is applied
//! component by component, still following any link it runs into.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, instrument, warn};

use crate::error::PathViolation;
use crate::policy::Policy;

/// Same limit as Linux `ELOOP`.
const MAX_SYMLINK_HOPS: usize = 40;

/// Decides whether an output path lies under an allowed root.
#[derive(Debug, Clone)]
pub struct OutputGuard {
    /// Canonical working directory, used for relative candidates.
    base: Option<PathBuf>,
    /// Resolved allowed roots.
    roots: Vec<PathBuf>,
    /// Roots as configured, for messages.
    allowed: String,
}

impl OutputGuard {
    /// Creates a guard over the working directory and the fixed output roots.
    ///
    /// Roots that cannot be resolved (no home directory, no readable working
    /// directory) are left out, which only narrows what is allowed.
    #[must_use]
    pub fn new() -> Self {
        Self::with_roots(std::env::current_dir().ok(), Policy::global().output_roots())
    }

    pub(crate) fn with_roots(base: Option<PathBuf>, listed: &[&str]) -> Self {
        let base = base.and_then(|b| resolve(&b, 0).ok());

        let roots: Vec<PathBuf> = listed
            .iter()
            .filter_map(|root| {
                let absolute = absolutize_root(root, base.as_deref())?;
                match resolve(&absolute, 0) {
                    Ok(resolved) => Some(resolved),
                    Err(reason) => {
                        debug!(root, %reason, "Skipping unresolvable output root");
                        None
                    }
                }
            })
            .collect();

        debug!(roots = ?roots, "Output roots resolved");

        Self {
            base,
            roots,
            allowed: listed.join(", "),
        }
    }

    /// Resolved roots, in configured order.
    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Validates that `path` resolves under an allowed root.
    ///
    /// # Errors
    ///
    /// Returns [`PathViolation::NotAllowed`] when the resolved path is outside
    /// every root, and [`PathViolation::Unresolvable`] when it cannot be put
    /// in absolute form at all.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn validate(&self, path: &Path) -> Result<PathBuf, PathViolation> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            match &self.base {
                Some(base) => base.join(path),
                None => {
                    return Err(PathViolation::Unresolvable {
                        path: path.to_path_buf(),
                        reason: "current directory is unavailable".to_string(),
                    });
                }
            }
        };

        let resolved = resolve(&absolute, 0).map_err(|reason| PathViolation::Unresolvable {
            path: path.to_path_buf(),
            reason,
        })?;

        debug!(resolved = %resolved.display(), "Resolved output path");

        if self.roots.iter().any(|root| resolved.starts_with(root)) {
            return Ok(resolved);
        }

        warn!(resolved = %resolved.display(), "Output path outside allowed roots");
        Err(PathViolation::NotAllowed {
            path: path.to_path_buf(),
            allowed: self.allowed.clone(),
        })
    }
}

impl Default for OutputGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Validates an output path against the default roots.
///
/// Convenience for one-off checks without keeping a guard around.
pub fn validate_output_path(path: impl AsRef<Path>) -> Result<PathBuf, PathViolation> {
    OutputGuard::new().validate(path.as_ref())
}

fn absolutize_root(root: &str, base: Option<&Path>) -> Option<PathBuf> {
    if root == "~" {
        return dirs::home_dir();
    }
    if let Some(rest) = root.strip_prefix("~/") {
        return dirs::home_dir().map(|home| home.join(rest));
    }

    let root = Path::new(root);
    if root.is_absolute() {
        Some(root.to_path_buf())
    } else {
        base.map(|b| b.join(root))
    }
}

/// Resolves an absolute path whose tail may not exist yet.
fn resolve(path: &Path, hops: usize) -> Result<PathBuf, String> {
    if hops > MAX_SYMLINK_HOPS {
        return Err("too many levels of symbolic links".to_string());
    }

    let (mut resolved, rest) = path
        .ancestors()
        .find_map(|ancestor| {
            let canonical = fs::canonicalize(ancestor).ok()?;
            let rest = path.strip_prefix(ancestor).ok()?;
            Some((canonical, rest))
        })
        .ok_or_else(|| "no existing ancestor".to_string())?;

    let mut components = rest.components();
    while let Some(component) = components.next() {
        match component {
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(part) => {
                resolved.push(part);
                let is_link = fs::symlink_metadata(&resolved)
                    .is_ok_and(|meta| meta.file_type().is_symlink());
                if is_link {
                    // Outside the canonicalized prefix, so follow it by hand.
                    let target = fs::read_link(&resolved).map_err(|e| e.to_string())?;
                    resolved.pop();
                    let mut next = resolved.join(target);
                    let remaining = components.as_path();
                    if !remaining.as_os_str().is_empty() {
                        next.push(remaining);
                    }
                    return resolve(&next, hops + 1);
                }
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }

    Ok(resolved)
}
