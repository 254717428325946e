//! Deterministic unique-name generation for record name collisions.

use std::collections::BTreeSet;

/// Produce a name not present in `taken`.
///
/// If `desired` itself is free it is returned unchanged; otherwise the
/// candidates `"<desired> (1)"`, `"<desired> (2)"`, ... are tried in order
/// and the first gap wins. Pure and total: no randomization, no timestamps,
/// so the same inputs always yield the same result.
pub fn resolve_name(desired: &str, taken: &BTreeSet<String>) -> String {
    if !taken.contains(desired) {
        return desired.to_string();
    }
    let mut counter = 1u32;
    loop {
        let candidate = format!("{} ({})", desired, counter);
        if !taken.contains(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taken(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_free_name_unchanged() {
        assert_eq!(resolve_name("HDR", &taken(&["DV", "Remux"])), "HDR");
        assert_eq!(resolve_name("HDR", &BTreeSet::new()), "HDR");
    }

    #[test]
    fn test_collision_appends_counter() {
        assert_eq!(resolve_name("HDR", &taken(&["HDR"])), "HDR (1)");
        assert_eq!(resolve_name("HDR", &taken(&["HDR", "HDR (1)"])), "HDR (2)");
    }

    #[test]
    fn test_first_gap_wins() {
        let t = taken(&["HDR", "HDR (1)", "HDR (3)"]);
        assert_eq!(resolve_name("HDR", &t), "HDR (2)");
    }

    #[test]
    fn test_deterministic() {
        let t = taken(&["HDR", "HDR (1)"]);
        let a = resolve_name("HDR", &t);
        let b = resolve_name("HDR", &t);
        assert_eq!(a, b);
        assert!(!t.contains(&a));
    }
}
