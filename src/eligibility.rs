//! Deciding whether a Deployment asked for the sidecar

use std::collections::BTreeMap;

/// Annotation that opts a Deployment into injection
pub const INJECT_ANNOTATION: &str = "sidecar-injector.io/inject";

/// Returns true only when the inject annotation is exactly `"true"`.
pub fn should_inject(annotations: Option<&BTreeMap<String, String>>) -> bool {
    annotations
        .and_then(|annotations| annotations.get(INJECT_ANNOTATION))
        .map_or(false, |value| value == "true")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotations(value: &str) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert(INJECT_ANNOTATION.to_string(), value.to_string());
        map
    }

    #[test]
    fn exact_true_is_eligible() {
        assert!(should_inject(Some(&annotations("true"))));
    }

    #[test]
    fn other_values_are_not_coerced() {
        for value in &["false", "True", "TRUE", "1", "yes", ""] {
            assert!(!should_inject(Some(&annotations(value))), "{}", value);
        }
    }

    #[test]
    fn missing_annotations() {
        assert!(!should_inject(None));
        assert!(!should_inject(Some(&BTreeMap::new())));
    }
}
