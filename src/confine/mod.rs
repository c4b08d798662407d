//! Input sanitization and output path confinement.
//!
//! User-supplied strings reach generated scripts in two places: the diagram
//! title and the output file stem. Both are reduced to a fixed character set
//! here before a template ever sees them, and the final output location is
//! proven to sit under an allowed root before anything runs.
//!
//! Nothing in this module creates, deletes, or spawns anything. The only
//! filesystem access is metadata lookups during path resolution.

mod guard;

pub use guard::{OutputGuard, validate_output_path};

/// Maximum length of a sanitized display name, in characters.
pub const MAX_DISPLAY_NAME_CHARS: usize = 200;

/// Maximum length of a sanitized file stem, in characters.
pub const MAX_FILE_STEM_CHARS: usize = 100;

/// Punctuation kept in display names besides letters, digits and whitespace.
const DISPLAY_NAME_PUNCTUATION: &[char] = &['-', '_', '.', ',', '!', '?', '(', ')', '\'', '"'];

/// Path separators, drive and quoting characters stripped from file stems.
const FILE_STEM_FORBIDDEN: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Keeps ASCII letters and digits, whitespace, and `-_.,!?()'"`; everything
/// else is dropped. The result is truncated to [`MAX_DISPLAY_NAME_CHARS`].
#[must_use]
pub fn sanitize_display_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| {
            c.is_ascii_alphanumeric() || c.is_whitespace() || DISPLAY_NAME_PUNCTUATION.contains(c)
        })
        .take(MAX_DISPLAY_NAME_CHARS)
        .collect()
}

/// Strips separators and `..` sequences from an output file stem.
///
/// `..` is removed repeatedly until none remain, so inputs like `....` that
/// re-form the sequence after one pass are still cleaned. The result is a
/// fixed point: sanitizing it again returns it unchanged.
#[must_use]
pub fn sanitize_file_stem(raw: &str) -> String {
    let mut stem: String = raw
        .chars()
        .filter(|c| !FILE_STEM_FORBIDDEN.contains(c))
        .collect();

    while stem.contains("..") {
        stem = stem.replace("..", "");
    }

    stem.chars().take(MAX_FILE_STEM_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_keeps_allowed_characters() {
        let raw = "Customer Portal (v2) - \"Prod\", it's live! ok? a_b.c";
        assert_eq!(sanitize_display_name(raw), raw);
    }

    #[test]
    fn test_display_name_drops_shell_metacharacters() {
        assert_eq!(
            sanitize_display_name("x; rm -rf / `id` $(whoami) & | > <"),
            "x rm -rf  id (whoami)    "
        );
    }

    #[test]
    fn test_display_name_drops_non_ascii_letters() {
        assert_eq!(sanitize_display_name("Café"), "Caf");
    }

    #[test]
    fn test_display_name_truncates_by_characters() {
        let raw = "a".repeat(250);
        assert_eq!(sanitize_display_name(&raw).chars().count(), MAX_DISPLAY_NAME_CHARS);
    }

    #[test]
    fn test_file_stem_traversal() {
        assert_eq!(sanitize_file_stem("../../etc/passwd"), "etcpasswd");
    }

    #[test]
    fn test_file_stem_reformed_traversal() {
        assert_eq!(sanitize_file_stem("...."), "");
        assert_eq!(sanitize_file_stem("....."), ".");
        assert_eq!(sanitize_file_stem("a.../b"), "a.b");
    }

    #[test]
    fn test_file_stem_strips_separators_and_quotes() {
        assert_eq!(sanitize_file_stem(r#"C:\out\"a|b"<c>*?"#), "Coutabc");
    }

    #[test]
    fn test_file_stem_keeps_ordinary_names() {
        assert_eq!(sanitize_file_stem("customer-arch_v2.final"), "customer-arch_v2.final");
    }

    #[test]
    fn test_file_stem_truncates() {
        let raw = "b".repeat(150);
        assert_eq!(sanitize_file_stem(&raw).len(), MAX_FILE_STEM_CHARS);
    }

    mod properties {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn file_stem_is_a_fixed_point(raw in ".*") {
                let once = sanitize_file_stem(&raw);
                prop_assert_eq!(sanitize_file_stem(&once), once);
            }

            #[test]
            fn file_stem_never_escapes(raw in "[./\\\\a-z:]{0,64}") {
                let stem = sanitize_file_stem(&raw);
                prop_assert!(!stem.contains(".."));
                prop_assert!(!stem.contains('/'));
                prop_assert!(!stem.contains('\\'));
            }

            #[test]
            fn display_name_has_no_shell_metacharacters(raw in ".*") {
                let name = sanitize_display_name(&raw);
                for forbidden in [';', '|', '&', '$', '`', '<', '>', '{', '}', '\\', '/'] {
                    prop_assert!(!name.contains(forbidden));
                }
                prop_assert!(name.chars().count() <= MAX_DISPLAY_NAME_CHARS);
            }
        }
    }
}
