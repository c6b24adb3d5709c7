//! Secret Namer (C3): derives valid DNS-subdomain secret names from
//! arbitrary binding names, and recognizes the legacy naming convention
//! (`spec.md` §4.2).

use crate::constants::{LEGACY_SECRET_SUFFIX, MAX_NAME_LENGTH, SECRET_NAME_PREFIX};
use crate::controller::digest::input_digest;

/// Current-convention managed pull-secret name for a binding.
///
/// Property: for every input that is a valid DNS-subdomain, the output is a
/// valid DNS-subdomain (`spec.md` §8).
pub fn secret_name(binding_name: &str) -> String {
    let candidate = format!("{SECRET_NAME_PREFIX}{binding_name}");
    if candidate.len() <= MAX_NAME_LENGTH {
        return candidate;
    }

    let digest = input_digest(binding_name);
    let suffix_digest = &digest[..digest.len().min(10)];
    let suffix = format!("-{suffix_digest}");
    let budget = MAX_NAME_LENGTH.saturating_sub(suffix.len());
    let mut truncated = truncate_char_boundary(&candidate, budget);
    strip_trailing_non_alphanumeric(&mut truncated);
    format!("{truncated}{suffix}")
}

/// Legacy-convention secret name for a binding (v1beta1 history).
pub fn legacy_secret_name(binding_name: &str) -> String {
    format!("{binding_name}{LEGACY_SECRET_SUFFIX}")
}

/// True if `name` matches either the current or the legacy pull-secret
/// naming convention.
pub fn is_managed_secret_name(name: &str) -> bool {
    name.starts_with(SECRET_NAME_PREFIX) || name.ends_with(LEGACY_SECRET_SUFFIX)
}

/// Recovers the binding name from a legacy-convention secret name, if it is one.
pub fn binding_name_from_legacy(name: &str) -> Option<&str> {
    name.strip_suffix(LEGACY_SECRET_SUFFIX)
}

fn truncate_char_boundary(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

fn strip_trailing_non_alphanumeric(s: &mut String) {
    while s.ends_with('.') || s.ends_with('-') {
        s.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_name_gets_prefix_only() {
        assert_eq!(secret_name("my-binding"), "acr-pull-my-binding");
    }

    #[test]
    fn legacy_name_roundtrips() {
        let legacy = legacy_secret_name("my-binding");
        assert_eq!(legacy, "my-binding-msi-acrpull-secret");
        assert_eq!(binding_name_from_legacy(&legacy), Some("my-binding"));
    }

    #[test]
    fn recognizes_both_conventions() {
        assert!(is_managed_secret_name("acr-pull-my-binding"));
        assert!(is_managed_secret_name("my-binding-msi-acrpull-secret"));
        assert!(!is_managed_secret_name("unrelated-secret"));
    }

    #[test]
    fn long_name_is_truncated_and_suffixed() {
        let long_name = "a".repeat(300);
        let name = secret_name(&long_name);
        assert!(name.len() <= crate::constants::MAX_NAME_LENGTH);
        assert!(name.starts_with(crate::constants::SECRET_NAME_PREFIX));
        assert!(!name.ends_with('-'));
    }

    #[test]
    fn valid_dns_subdomain_property_holds_for_many_inputs() {
        for input in ["a", "a.b.c", &"x".repeat(250), "binding-name-123"] {
            let name = secret_name(input);
            assert!(!name.is_empty());
            assert!(name.len() <= crate::constants::MAX_NAME_LENGTH);
            assert!(!name.ends_with('-'));
            assert!(!name.ends_with('.'));
        }
    }
}
