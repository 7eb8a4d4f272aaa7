//! Name conversions shared by every stage.
//!
//! Two conversions live here and they serve different masters:
//!
//! - [`safe_name`] turns a display name into a token usable as a file name
//!   and as a lookup key. Cache files, content documents and the per-model
//!   content directory are all named with it.
//! - [`slugify`] turns a display name into a lowercase URL segment for the
//!   rendered site.
//!
//! ## Safe names
//!
//! Every character in the replacement set becomes `_`, everything else is
//! kept as-is. There is no trimming, no case folding and no collapsing:
//!
//! - `Python 3.10` → `Python_3_10`
//! - `C++` → `C__`
//! - `Visual Basic .NET` → `Visual_Basic__NET`
//!
//! Two names differing only in replaced characters map to the same token.
//! That collision is accepted.

/// Characters replaced by `_` in [`safe_name`].
const REPLACED: &[char] = &[
    '&', '/', '\\', ',', ' ', '+', '(', ')', '$', '~', '%', '.', '\'', '"', ':', '*', '?', '<',
    '>', '{', '}', '-',
];

/// Map a display name to a filesystem-safe token.
pub fn safe_name(value: &str) -> String {
    value
        .chars()
        .map(|c| if REPLACED.contains(&c) { '_' } else { c })
        .collect()
}

/// Convert text to a URL-friendly slug.
///
/// Lowercases, drops anything that is not alphanumeric, `_`, whitespace or
/// `-`, then collapses runs of whitespace and hyphens into one `-`.
///
/// - `"Rust 1.55"` → `"rust-155"`
/// - `"String Concatenation"` → `"string-concatenation"`
/// - `"C++"` → `"c"`
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.to_lowercase().chars() {
        if c.is_whitespace() || c == '-' {
            pending_dash = true;
        } else if c.is_alphanumeric() || c == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_name_replaces_space_and_dot() {
        assert_eq!(safe_name("Python 3.10"), "Python_3_10");
        assert_eq!(safe_name("Rust 1.55"), "Rust_1_55");
    }

    #[test]
    fn safe_name_does_not_collapse() {
        assert_eq!(safe_name("C++"), "C__");
        assert_eq!(safe_name("Visual Basic .NET"), "Visual_Basic__NET");
        assert_eq!(
            safe_name("JavaScript - ECMAScript 2021"),
            "JavaScript___ECMAScript_2021"
        );
    }

    #[test]
    fn safe_name_hyphen() {
        assert_eq!(safe_name("Objective-C"), "Objective_C");
    }

    #[test]
    fn safe_name_empty() {
        assert_eq!(safe_name(""), "");
    }

    #[test]
    fn safe_name_every_replaced_character() {
        let all: String = REPLACED.iter().collect();
        assert_eq!(safe_name(&all), "_".repeat(REPLACED.len()));
    }

    #[test]
    fn safe_name_keeps_other_characters() {
        assert_eq!(safe_name("C#"), "C#");
        assert_eq!(safe_name("Python"), "Python");
        assert_eq!(safe_name("Élixir_1"), "Élixir_1");
    }

    #[test]
    fn safe_name_is_idempotent() {
        for name in ["Python 3.10", "C++", "a/b\\c", "{x}", "", "Objective-C"] {
            let once = safe_name(name);
            assert_eq!(safe_name(&once), once, "not idempotent for {name:?}");
        }
    }

    #[test]
    fn safe_name_collisions_are_silent() {
        assert_eq!(safe_name("C.C"), safe_name("C-C"));
    }

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Rust 1.55"), "rust-155");
        assert_eq!(slugify("String Concatenation"), "string-concatenation");
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("  Go -- Generics  "), "go-generics");
    }

    #[test]
    fn slugify_drops_symbols() {
        assert_eq!(slugify("C++"), "c");
        assert_eq!(slugify("What's new?"), "whats-new");
    }

    #[test]
    fn slugify_keeps_underscores() {
        assert_eq!(slugify("Python_3_10"), "python_3_10");
    }
}
