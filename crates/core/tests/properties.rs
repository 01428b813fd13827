use beacon_core::{classify, render, wrap_value, HeaderList, ParameterSet, RequestMeta, SchemaRegistry};
use proptest::prelude::*;
use std::collections::HashSet;

fn key_strategy() -> impl Strategy<Value = String> {
    let registry = SchemaRegistry::analytics();
    let known: Vec<String> = registry.entries().map(|e| e.key).collect();
    prop_oneof![
        proptest::sample::select(known),
        "[a-zA-Z][a-zA-Z0-9]{0,4}",
    ]
}

fn params_strategy() -> impl Strategy<Value = ParameterSet> {
    proptest::collection::vec((key_strategy(), "[ -~]{0,50}", any::<bool>()), 0..40).prop_map(
        |entries| {
            let mut params = ParameterSet::new();
            for (key, value, empty) in entries {
                if empty {
                    params.insert_empty(key);
                } else {
                    params.push(key, value);
                }
            }
            params
        },
    )
}

proptest! {
    #[test]
    fn registry_keys_are_either_present_or_unused(params in params_strategy()) {
        let registry = SchemaRegistry::analytics();
        let result = classify(&params, &registry);

        let present: HashSet<&str> = result
            .standard
            .iter()
            .chain(&result.custom)
            .map(|f| f.key.as_str())
            .collect();
        let unused: HashSet<&str> = result.unused.iter().map(String::as_str).collect();

        for key in registry.standard_keys().iter().chain(registry.custom_definition_keys()) {
            prop_assert!(
                present.contains(key.as_str()) ^ unused.contains(key.as_str()),
                "{key} must be in exactly one of present/unused"
            );
        }
    }

    #[test]
    fn unknown_iff_not_in_known_set(params in params_strategy()) {
        let registry = SchemaRegistry::analytics();
        let result = classify(&params, &registry);
        let unknown: HashSet<&str> = result.unknown.iter().map(|f| f.key.as_str()).collect();

        for key in params.keys() {
            prop_assert_eq!(unknown.contains(key), !registry.known_key_set().contains(key));
        }
        prop_assert_eq!(unknown.len(), result.unknown.len());
    }

    #[test]
    fn missing_required_iff_absent(params in params_strategy()) {
        let registry = SchemaRegistry::analytics();
        let result = classify(&params, &registry);

        for key in registry.required_keys() {
            prop_assert_eq!(result.missing_required.contains(key), !params.contains(key));
        }
    }

    #[test]
    fn rendering_is_deterministic(params in params_strategy()) {
        let registry = SchemaRegistry::analytics();
        let result = classify(&params, &registry);
        let meta = RequestMeta::default();
        let headers = HeaderList::default();

        prop_assert_eq!(render(&meta, &headers, &result), render(&meta, &headers, &result));
    }

    #[test]
    fn wrapped_chunks_reassemble_the_value(value in "[ -~]{0,200}") {
        let chunks = wrap_value(&value);
        prop_assert_eq!(chunks.concat(), value.clone());
        let expected = if value.len() < 40 { 1 } else { value.len().div_ceil(40) };
        prop_assert_eq!(chunks.len(), expected);
        for chunk in &chunks[..chunks.len() - 1] {
            prop_assert_eq!(chunk.len(), 40);
        }
    }
}
