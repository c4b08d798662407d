//! Built-in architecture diagram templates.
//!
//! Each template is a Python script for the `diagrams` package, shipped in
//! `templates/` and compiled into the binary. Two placeholders are filled in
//! at render time: `{name}` (diagram title) and `{output}` (file stem).
//! Literal braces are written `{{` and `}}`.

use crate::error::TemplateError;

/// One entry in the template catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pattern {
    id: &'static str,
    description: &'static str,
    source: &'static str,
}

static CATALOG: [Pattern; 9] = [
    Pattern {
        id: "api-led",
        description: "API-Led Connectivity (3-tier: Experience, Process, System)",
        source: include_str!("../../templates/api-led.py"),
    },
    Pattern {
        id: "hybrid",
        description: "Hybrid Integration (On-premises to Azure)",
        source: include_str!("../../templates/hybrid.py"),
    },
    Pattern {
        id: "event-driven",
        description: "Event-Driven Architecture (Pub/Sub with multiple handlers)",
        source: include_str!("../../templates/event-driven.py"),
    },
    Pattern {
        id: "microservices",
        description: "Microservices with Service Bus (Domain-driven design)",
        source: include_str!("../../templates/microservices.py"),
    },
    Pattern {
        id: "b2b-edi",
        description: "B2B/EDI Integration (Trading partners with Integration Accounts)",
        source: include_str!("../../templates/b2b-edi.py"),
    },
    Pattern {
        id: "data-pipeline",
        description: "Data Pipeline (ETL/ELT with Data Factory and Synapse)",
        source: include_str!("../../templates/data-pipeline.py"),
    },
    Pattern {
        id: "secure-private",
        description: "Secure Architecture (Private Endpoints and VNet Integration)",
        source: include_str!("../../templates/secure-private.py"),
    },
    Pattern {
        id: "multi-region",
        description: "Multi-Region HA (Geo-redundant with Front Door)",
        source: include_str!("../../templates/multi-region.py"),
    },
    Pattern {
        id: "iot-streaming",
        description: "IoT & Streaming (Real-time data ingestion and processing)",
        source: include_str!("../../templates/iot-streaming.py"),
    },
];

impl Pattern {
    /// All patterns, in catalog order.
    #[must_use]
    pub fn all() -> &'static [Pattern] {
        &CATALOG
    }

    /// Finds a pattern by id.
    #[must_use]
    pub fn lookup(id: &str) -> Option<&'static Pattern> {
        CATALOG.iter().find(|p| p.id == id)
    }

    /// Finds a pattern by its 1-based position in the catalog.
    #[must_use]
    pub fn from_index(index: usize) -> Option<&'static Pattern> {
        index.checked_sub(1).and_then(|i| CATALOG.get(i))
    }

    /// Comma-separated ids, for messages.
    #[must_use]
    pub fn available() -> String {
        CATALOG.iter().map(|p| p.id).collect::<Vec<_>>().join(", ")
    }

    #[must_use]
    pub fn id(&self) -> &'static str {
        self.id
    }

    #[must_use]
    pub fn description(&self) -> &'static str {
        self.description
    }
}

/// Renders `pattern` with the given title and output stem.
///
/// Both values land inside double-quoted Python string literals. Quotes,
/// backslashes and line breaks in them are escaped so they cannot end the
/// literal early. Callers are still expected to pass sanitized values.
///
/// # Errors
///
/// Returns a [`TemplateError`] if the template uses a placeholder other than
/// `{name}` or `{output}`, or has an unbalanced brace.
pub fn render(
    pattern: &Pattern,
    display_name: &str,
    file_stem: &str,
) -> Result<String, TemplateError> {
    render_source(pattern.source, display_name, file_stem)
}

fn render_source(source: &str, name: &str, output: &str) -> Result<String, TemplateError> {
    let mut rendered = String::with_capacity(source.len() + name.len() + output.len());
    let mut chars = source.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        match c {
            '{' => {
                if chars.next_if(|&(_, next)| next == '{').is_some() {
                    rendered.push('{');
                    continue;
                }
                let start = offset + 1;
                let end = chars
                    .by_ref()
                    .find(|&(_, next)| next == '}')
                    .map(|(i, _)| i)
                    .ok_or(TemplateError::Unterminated { offset })?;
                match &source[start..end] {
                    "name" => push_escaped(&mut rendered, name),
                    "output" => push_escaped(&mut rendered, output),
                    other => {
                        return Err(TemplateError::UnknownPlaceholder {
                            name: other.to_string(),
                        });
                    }
                }
            }
            '}' => {
                if chars.next_if(|&(_, next)| next == '}').is_none() {
                    return Err(TemplateError::UnmatchedBrace { offset });
                }
                rendered.push('}');
            }
            c => rendered.push(c),
        }
    }

    Ok(rendered)
}

fn push_escaped(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::validate;

    #[test]
    fn test_catalog_order() {
        let ids: Vec<_> = Pattern::all().iter().map(Pattern::id).collect();
        assert_eq!(
            ids,
            vec![
                "api-led",
                "hybrid",
                "event-driven",
                "microservices",
                "b2b-edi",
                "data-pipeline",
                "secure-private",
                "multi-region",
                "iot-streaming",
            ]
        );
    }

    #[test]
    fn test_from_index_is_one_based() {
        assert_eq!(Pattern::from_index(1).map(Pattern::id), Some("api-led"));
        assert_eq!(Pattern::from_index(9).map(Pattern::id), Some("iot-streaming"));
        assert!(Pattern::from_index(0).is_none());
        assert!(Pattern::from_index(10).is_none());
    }

    #[test]
    fn test_lookup() {
        let pattern = Pattern::lookup("hybrid").expect("hybrid is in the catalog");
        assert_eq!(pattern.description(), "Hybrid Integration (On-premises to Azure)");
        assert!(Pattern::lookup("Hybrid").is_none());
    }

    #[test]
    fn test_render_fills_placeholders_and_unescapes_braces() {
        let pattern = Pattern::lookup("api-led").expect("api-led is in the catalog");
        let code = render(pattern, "Customer Portal", "customer-portal").expect("render");

        assert!(code.contains(
            r#"with Diagram("Customer Portal", show=False, filename="customer-portal""#
        ));
        assert!(code.contains(r#"graph_attr={"fontsize": "20""#));
        assert!(!code.contains("{name}"));
        assert!(!code.contains("{{"));
    }

    #[test]
    fn test_every_template_renders_to_valid_code() {
        for pattern in Pattern::all() {
            let code = render(pattern, "Title", "out").expect("render");
            let result = validate(&code);
            assert!(result.is_valid(), "{} failed validation:\n{result}", pattern.id());
        }
    }

    #[test]
    fn test_quotes_in_values_stay_inside_the_literal() {
        let pattern = Pattern::lookup("hybrid").expect("hybrid is in the catalog");
        let code = render(pattern, r#"It's "big") ; import os #"#, "out").expect("render");

        assert!(code.contains(r#"Diagram("It\'s \"big\") ; import os #""#));
        assert!(validate(&code).is_valid());
    }

    #[test]
    fn test_line_breaks_in_values_are_escaped() {
        let code = render_source("x = \"{name}\"\n", "a\nimport os", "o").expect("render");
        assert_eq!(code, "x = \"a\\nimport os\"\n");
    }

    #[test]
    fn test_unknown_placeholder() {
        let err = render_source("x = \"{title}\"", "a", "b").unwrap_err();
        assert_eq!(
            err,
            TemplateError::UnknownPlaceholder {
                name: "title".to_string()
            }
        );
    }

    #[test]
    fn test_unterminated_placeholder() {
        let err = render_source("x = {name", "a", "b").unwrap_err();
        assert_eq!(err, TemplateError::Unterminated { offset: 4 });
    }

    #[test]
    fn test_lone_closing_brace() {
        let err = render_source("x = }", "a", "b").unwrap_err();
        assert_eq!(err, TemplateError::UnmatchedBrace { offset: 4 });
    }
}
