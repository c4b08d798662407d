//! Compiled-in capability policy for generated diagram scripts.
//!
//! These tables define everything a script is allowed to touch:
//!
//! - which modules it may import (allow-list plus an overriding deny-list)
//! - which call targets are forbidden (reflection, process and I/O escapes)
//! - which dunder attributes are forbidden (object-graph walking)
//! - which directories output files may land in
//!
//! The tables are constants. [`Policy::global`] turns them into lookup sets
//! exactly once per process and hands out a shared reference; there is no way
//! to add or remove entries at runtime.

use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Duration;

/// Default wall-clock budget for a sandboxed run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Modules (and, through dotted extension, their submodules) a script may import.
pub const ALLOWED_IMPORTS: &[&str] = &[
    // diagrams core
    "diagrams",
    // Azure services
    "diagrams.azure",
    "diagrams.azure.aimachinelearning",
    "diagrams.azure.analytics",
    "diagrams.azure.azurestack",
    "diagrams.azure.blockchain",
    "diagrams.azure.compute",
    "diagrams.azure.containers",
    "diagrams.azure.database",
    "diagrams.azure.databases",
    "diagrams.azure.devops",
    "diagrams.azure.general",
    "diagrams.azure.identity",
    "diagrams.azure.integration",
    "diagrams.azure.intune",
    "diagrams.azure.iot",
    "diagrams.azure.managementgovernance",
    "diagrams.azure.migration",
    "diagrams.azure.mixedreality",
    "diagrams.azure.ml",
    "diagrams.azure.monitor",
    "diagrams.azure.network",
    "diagrams.azure.networking",
    "diagrams.azure.security",
    "diagrams.azure.storage",
    "diagrams.azure.web",
    // on-premises
    "diagrams.onprem",
    "diagrams.onprem.client",
    "diagrams.onprem.compute",
    "diagrams.onprem.database",
    "diagrams.onprem.network",
    // generic shapes
    "diagrams.generic",
    "diagrams.generic.blank",
    "diagrams.generic.compute",
    "diagrams.generic.database",
    "diagrams.generic.storage",
    // flowcharts
    "diagrams.programming",
    "diagrams.programming.flowchart",
    // SaaS
    "diagrams.saas",
    "diagrams.saas.chat",
    "diagrams.saas.erp",
    "diagrams.saas.cdn",
    "diagrams.custom",
    // process flows and ERDs
    "graphviz",
    // timelines and Gantt charts
    "matplotlib",
    "matplotlib.pyplot",
    "matplotlib.patches",
    "matplotlib.dates",
    "numpy",
    // wireframes
    "svgwrite",
    "cairosvg",
    // data and time handling
    "datetime",
    "collections",
    "pathlib",
];

/// Base module names rejected unconditionally, even when an allow-list entry matches.
pub const BLOCKED_IMPORTS: &[&str] = &[
    "os",
    "sys",
    "subprocess",
    "socket",
    "urllib",
    "requests",
    "http",
    "pickle",
    "shelve",
    "ctypes",
    "importlib",
    "shutil",
    "glob",
    "fnmatch",
    "io",
    "builtins",
    "code",
    "codeop",
    "marshal",
    "types",
];

/// Call targets that are never allowed, whether called bare or as a method.
pub const BLOCKED_BUILTINS: &[&str] = &[
    "exec",
    "eval",
    "compile",
    "open",
    "__import__",
    "globals",
    "locals",
    "vars",
    "dir",
    "getattr",
    "setattr",
    "delattr",
    "hasattr",
    "breakpoint",
    "input",
    "help",
];

/// Attribute names that are never allowed, read or call.
pub const BLOCKED_ATTRIBUTES: &[&str] = &[
    "__class__",
    "__bases__",
    "__subclasses__",
    "__globals__",
    "__code__",
    "__builtins__",
    "__import__",
    "__loader__",
    "__spec__",
    "__dict__",
    "__mro__",
    "__init_subclass__",
];

/// Directories output files may be written under, in display order.
///
/// A leading `~` is expanded to the user's home directory at resolution time.
/// The invoking process's working directory is always allowed in addition.
pub const ALLOWED_OUTPUT_DIRS: &[&str] = &[".", "/mnt/user-data/outputs", "/tmp", "~/outputs"];

static GLOBAL: OnceLock<Policy> = OnceLock::new();

/// Immutable lookup view over the policy tables.
#[derive(Debug)]
pub struct Policy {
    allowed_imports: HashSet<&'static str>,
    blocked_imports: HashSet<&'static str>,
    blocked_builtins: HashSet<&'static str>,
    blocked_attributes: HashSet<&'static str>,
    output_roots: &'static [&'static str],
}

impl Policy {
    /// Returns the process-wide policy, building it on first use.
    pub fn global() -> &'static Policy {
        GLOBAL.get_or_init(Self::compiled)
    }

    fn compiled() -> Self {
        Self {
            allowed_imports: ALLOWED_IMPORTS.iter().copied().collect(),
            blocked_imports: BLOCKED_IMPORTS.iter().copied().collect(),
            blocked_builtins: BLOCKED_BUILTINS.iter().copied().collect(),
            blocked_attributes: BLOCKED_ATTRIBUTES.iter().copied().collect(),
            output_roots: ALLOWED_OUTPUT_DIRS,
        }
    }

    /// Checks a dotted module path against the import tables.
    ///
    /// The deny-list is consulted first and wins outright. Otherwise the module
    /// must equal an allow-list entry or extend one across a `.` boundary, so
    /// `pkg.foo` never satisfies an entry `pkg.fo`.
    #[must_use]
    pub fn is_import_allowed(&self, module: &str) -> bool {
        let base = module.split('.').next().unwrap_or(module);
        if self.blocked_imports.contains(base) {
            return false;
        }

        if self.allowed_imports.contains(module) {
            return true;
        }

        self.allowed_imports.iter().any(|allowed| {
            module
                .strip_prefix(allowed)
                .is_some_and(|rest| rest.starts_with('.'))
        })
    }

    #[must_use]
    pub fn is_builtin_blocked(&self, name: &str) -> bool {
        self.blocked_builtins.contains(name)
    }

    #[must_use]
    pub fn is_attribute_blocked(&self, name: &str) -> bool {
        self.blocked_attributes.contains(name)
    }

    /// Allowed output roots in their symbolic (unexpanded) form.
    #[must_use]
    pub fn output_roots(&self) -> &'static [&'static str] {
        self.output_roots
    }
}
