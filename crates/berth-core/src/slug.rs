//! URL-safe slug derivation.

/// Derive a slug from a display name.
///
/// Lower-cases the input, collapses every run of characters outside
/// `[a-z0-9]` into a single hyphen, and strips leading/trailing hyphens.
/// An input with no usable characters falls back to `"resource"`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for ch in name.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch);
        } else {
            pending_hyphen = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("resource");
    }
    slug
}

/// Derive a slug that does not collide with any member of `existing`.
///
/// On collision, `-2`, `-3`, … is appended; the first free suffix wins.
pub fn slugify_unique<S: AsRef<str>>(name: &str, existing: &[S]) -> String {
    let base = slugify(name);
    if !existing.iter().any(|s| s.as_ref() == base) {
        return base;
    }
    let mut suffix = 2u64;
    loop {
        let candidate = format!("{base}-{suffix}");
        if !existing.iter().any(|s| s.as_ref() == candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn basic_slugs() {
        assert_eq!(slugify("Vector Dashboard"), "vector-dashboard");
        assert_eq!(slugify("  Spaced  Out  "), "spaced-out");
        assert_eq!(slugify("C++ Parser v2.1"), "c-parser-v2-1");
        assert_eq!(slugify("ALLCAPS"), "allcaps");
    }

    #[test]
    fn empty_input_falls_back() {
        assert_eq!(slugify(""), "resource");
        assert_eq!(slugify("!!!"), "resource");
    }

    #[test]
    fn slugify_is_idempotent() {
        for name in ["Vector Dashboard", "c-parser-v2-1", "", "Ünïcode Näme"] {
            let once = slugify(name);
            assert_eq!(slugify(&once), once);
        }
    }

    #[test]
    fn collision_appends_first_free_suffix() {
        let existing = ["demo", "demo-2"];
        assert_eq!(slugify_unique("Demo", &existing), "demo-3");
        assert_eq!(slugify_unique("Other", &existing), "other");
    }

    #[test]
    fn unique_result_never_in_existing_set() {
        let existing: Vec<String> =
            (2..50).map(|n| format!("demo-{n}")).chain(["demo".to_owned()]).collect();
        let slug = slugify_unique("Demo", &existing);
        assert!(!existing.contains(&slug));
    }
}
