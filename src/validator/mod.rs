//! Static capability validation for generated Python scripts.
//!
//! [`validate`] parses a script and reports every use of a capability outside
//! the compiled-in [`Policy`]:
//!
//! - imports whose base module is deny-listed, or that match no allow-list entry
//! - calls whose syntactic target names a forbidden builtin
//! - attribute accesses naming a forbidden dunder attribute
//!
//! A script that does not parse yields a single syntax violation and nothing
//! else. All other violations are collected exhaustively in one pass.
//!
//! # Residual risk
//!
//! Builtin and attribute detection is a syntactic name match at the call or
//! access site. It cannot see through aliasing (`run = eval` followed by
//! `run(src)`) or dynamic lookup chains built from allowed names. The import
//! allow-list is the primary control; these checks are a second line.

mod syntax;

use std::fmt;

use tracing::{debug, instrument};

use crate::policy::Policy;

pub use syntax::{Construct, SyntaxError, Visitor, normalize_newlines, parse, walk};

/// Category of a [`Violation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    Syntax,
    Import,
    Builtin,
    Attribute,
}

/// One disallowed construct found in a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    kind: ViolationKind,
    message: String,
}

impl Violation {
    #[must_use]
    pub fn syntax(err: &SyntaxError) -> Self {
        Self {
            kind: ViolationKind::Syntax,
            message: format!(
                "Syntax error: {} at line {}, column {}",
                err.reason, err.line, err.column
            ),
        }
    }

    #[must_use]
    pub fn import(module: &str) -> Self {
        Self {
            kind: ViolationKind::Import,
            message: format!("Blocked import: '{module}'"),
        }
    }

    #[must_use]
    pub fn builtin(name: &str) -> Self {
        Self {
            kind: ViolationKind::Builtin,
            message: format!("Blocked builtin call: '{name}()'"),
        }
    }

    #[must_use]
    pub fn attribute(name: &str) -> Self {
        Self {
            kind: ViolationKind::Attribute,
            message: format!("Blocked attribute access: '{name}'"),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ViolationKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Outcome of [`validate`]: the violations in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct ValidationResult {
    violations: Vec<Violation>,
}

impl ValidationResult {
    /// `true` when no violation was recorded.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }

    /// Number of violations of the given kind.
    pub fn count(&self, kind: ViolationKind) -> usize {
        self.violations.iter().filter(|v| v.kind == kind).count()
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&ViolationList(&self.violations), f)
    }
}

/// Renders violations as one `  - message` line each.
pub(crate) struct ViolationList<'a>(pub &'a [Violation]);

impl fmt::Display for ViolationList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "  - {violation}")?;
        }
        Ok(())
    }
}

/// Validates `code` against the process-wide policy.
///
/// Line endings are normalized first, so the verdict covers the text an
/// interpreter would see. Pure: no I/O, no process, no shared mutable state.
#[instrument(skip_all, fields(bytes = code.len()))]
pub fn validate(code: &str) -> ValidationResult {
    let policy = Policy::global();
    let code = normalize_newlines(code);

    let tree = match parse(&code) {
        Ok(tree) => tree,
        Err(err) => {
            debug!(line = err.line, column = err.column, "Script failed to parse");
            return ValidationResult {
                violations: vec![Violation::syntax(&err)],
            };
        }
    };

    let mut checker = PolicyChecker {
        policy,
        violations: Vec::new(),
    };
    walk(&tree, &code, &mut checker);

    debug!(violations = checker.violations.len(), "Validation complete");
    ValidationResult {
        violations: checker.violations,
    }
}

struct PolicyChecker<'p> {
    policy: &'p Policy,
    violations: Vec<Violation>,
}

impl PolicyChecker<'_> {
    fn check_module(&mut self, module: &str) {
        if !self.policy.is_import_allowed(module) {
            self.violations.push(Violation::import(module));
        }
    }
}

impl Visitor for PolicyChecker<'_> {
    fn visit_import(&mut self, modules: &[String]) {
        for module in modules {
            self.check_module(module);
        }
    }

    fn visit_import_from(&mut self, module: Option<&str>) {
        if let Some(module) = module {
            self.check_module(module);
        }
    }

    fn visit_call(&mut self, target: Option<&str>) {
        if let Some(name) = target
            && self.policy.is_builtin_blocked(name)
        {
            self.violations.push(Violation::builtin(name));
        }
    }

    fn visit_attribute(&mut self, name: &str) {
        if self.policy.is_attribute_blocked(name) {
            self.violations.push(Violation::attribute(name));
        }
    }
}
