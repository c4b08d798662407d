//! Integration tests for static validation of generated scripts.

use diagram_guard::policy::{BLOCKED_IMPORTS, Policy};
use diagram_guard::validator::{ViolationKind, validate};
use pretty_assertions::assert_eq;

fn messages(code: &str) -> Vec<String> {
    validate(code)
        .violations()
        .iter()
        .map(|v| v.message().to_string())
        .collect()
}

/// Every deny-listed base module is rejected in both import forms.
#[test]
fn test_every_blocked_import_is_rejected() {
    for module in BLOCKED_IMPORTS {
        for code in [
            format!("import {module}\n"),
            format!("from {module} import something\n"),
            format!("import {module}.child as c\n"),
        ] {
            let result = validate(&code);
            assert!(!result.is_valid(), "{code:?} should be rejected");
            assert_eq!(result.count(ViolationKind::Import), 1, "{code:?}");
        }
    }
}

/// `io` is a substring of allowed names such as `diagrams.azure.iot`, and
/// `os` of `collections`; neither makes it allowed.
#[test]
fn test_substring_of_allowed_entry_does_not_help() {
    assert_eq!(messages("import io\n"), vec!["Blocked import: 'io'"]);
    assert_eq!(messages("import os\n"), vec!["Blocked import: 'os'"]);
}

#[test]
fn test_allowed_modules_and_submodules_pass() {
    let code = "\
import numpy as np
import matplotlib.pyplot as plt
from matplotlib.dates import DateFormatter
from diagrams import Diagram, Cluster, Edge
from diagrams.azure.compute import FunctionApps
from diagrams.saas.chat import Teams
from datetime import datetime
from pathlib import Path
from collections import OrderedDict
import graphviz
";
    let result = validate(code);
    assert!(result.is_valid(), "unexpected violations:\n{result}");
}

#[test]
fn test_dot_boundary() {
    assert!(Policy::global().is_import_allowed("matplotlib.pyplot"));
    assert_eq!(
        messages("import matplotlibx\nfrom numpyy import array\nimport pathlib2\n"),
        vec![
            "Blocked import: 'matplotlibx'",
            "Blocked import: 'numpyy'",
            "Blocked import: 'pathlib2'",
        ]
    );
}

#[test]
fn test_future_import_is_not_allow_listed() {
    assert_eq!(
        messages("from __future__ import annotations\n"),
        vec!["Blocked import: '__future__'"]
    );
}

#[test]
fn test_builtin_calls_bare_and_as_method() {
    assert_eq!(
        messages("open('x')\nnp.load('f').__import__('os')\nprint(dir())\n"),
        vec![
            "Blocked builtin call: 'open()'",
            "Blocked builtin call: '__import__()'",
            "Blocked attribute access: '__import__'",
            "Blocked builtin call: 'dir()'",
        ]
    );
}

/// Reading a blocked builtin without calling it is not flagged; the import
/// allow-list is what keeps such a reference harmless.
#[test]
fn test_uncalled_builtin_name_is_not_flagged() {
    assert!(validate("handler = print\nx = eval\n").is_valid());
}

#[test]
fn test_escape_chain_reports_each_hop() {
    let code = "x = ().__class__.__bases__[0].__subclasses__()\n";
    assert_eq!(
        messages(code),
        vec![
            "Blocked attribute access: '__subclasses__'",
            "Blocked attribute access: '__bases__'",
            "Blocked attribute access: '__class__'",
        ]
    );
}

#[test]
fn test_violations_are_collected_not_fail_fast() {
    let code = "\
import os
import socket
eval('1')
exec('2')
y = f.__globals__
";
    let result = validate(code);
    assert_eq!(result.violations().len(), 5);
    assert_eq!(result.count(ViolationKind::Import), 2);
    assert_eq!(result.count(ViolationKind::Builtin), 2);
    assert_eq!(result.count(ViolationKind::Attribute), 1);
}

#[test]
fn test_syntax_error_is_the_only_violation() {
    let result = validate("import os\neval(\n");
    assert_eq!(result.violations().len(), 1);
    assert_eq!(result.violations()[0].kind(), ViolationKind::Syntax);
}

#[test]
fn test_python2_print_statement_is_a_syntax_error() {
    let result = validate("print 'hello'\n");
    assert_eq!(result.count(ViolationKind::Syntax), 1);
}

#[test]
fn test_calls_nested_in_definitions_are_found() {
    let code = "\
def build():
    class Inner:
        def run(self):
            return [compile(s, 'f', 'exec') for s in items]
    return Inner
";
    assert_eq!(messages(code), vec!["Blocked builtin call: 'compile()'"]);
}

#[test]
fn test_empty_script_is_valid() {
    assert!(validate("").is_valid());
}

/// The interpreter splits lines on `\r\n` and on a lone `\r`; so does the
/// validator.
#[test]
fn test_carriage_returns_split_lines() {
    assert!(validate("import numpy\r\nx = numpy.zeros(3)\r\n").is_valid());
    assert_eq!(messages("import os\r\nprint(1)\r\n"), vec!["Blocked import: 'os'"]);
    assert_eq!(
        messages("# c\rimport os\rprint(\"x\", os.getpid())\n"),
        vec!["Blocked import: 'os'"]
    );
    assert_eq!(
        messages("x = 1\reval('2')\r"),
        vec!["Blocked builtin call: 'eval()'"]
    );
}

#[test]
fn test_form_feed_does_not_hide_statements() {
    assert_eq!(messages("\x0cimport os\n"), vec!["Blocked import: 'os'"]);
    assert!(validate("x = 1\n\x0cy = 2\n").is_valid());
}

#[test]
fn test_foreign_encoding_declaration_is_a_syntax_error() {
    for code in [
        "# coding: utf-7\n#+AAo-import os+AAo-print(os.getpid())\n",
        "# -*- coding: unicode_escape -*-\nx = '\\x27\\nimport os\\n#'\n",
        "#!/usr/bin/env python3\n# vim: set fileencoding=latin-1 :\nx = 1\n",
    ] {
        let result = validate(code);
        assert_eq!(result.violations().len(), 1, "{code:?}");
        assert_eq!(result.count(ViolationKind::Syntax), 1, "{code:?}");
    }
}

#[test]
fn test_utf8_encoding_declarations_are_accepted() {
    for code in [
        "# -*- coding: utf-8 -*-\nx = 1\n",
        "#!/usr/bin/env python3\n# coding=UTF8\nx = 1\n",
        "# coding: ascii\nx = 1\n",
        "\u{feff}# coding: utf_8\nx = 1\n",
    ] {
        assert!(validate(code).is_valid(), "{code:?}");
    }
}

/// Value and class patterns in `match` look attributes up just like
/// expressions do.
#[test]
fn test_match_patterns_are_checked_for_attributes() {
    let code = "\
match 1:
    case int.__class__:
        pass
    case Foo.__dict__():
        pass
    case [x, y.__globals__]:
        pass
    case _:
        pass
";
    assert_eq!(
        messages(code),
        vec![
            "Blocked attribute access: '__class__'",
            "Blocked attribute access: '__dict__'",
            "Blocked attribute access: '__globals__'",
        ]
    );
}

#[test]
fn test_plain_match_statement_is_valid() {
    let code = "\
from diagrams import Edge
match kind:
    case \"queue\" | \"topic\":
        style = Edge(color=\"blue\")
    case Point(x=0):
        style = None
    case other:
        style = other
";
    assert!(validate(code).is_valid(), "{}", validate(code));
}
