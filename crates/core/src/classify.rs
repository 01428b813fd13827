use crate::params::ParameterSet;
use crate::registry::SchemaRegistry;

/// A parameter found in the beacon, with its registry label when known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedField {
    pub key: String,
    pub label: Option<String>,
    pub values: Vec<String>,
}

/// Per-beacon view of the parameters against the registry.
///
/// `standard`, `custom` and `unused` follow registry order; `unknown` follows arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub standard: Vec<MatchedField>,
    pub custom: Vec<MatchedField>,
    pub unused: Vec<String>,
    pub unknown: Vec<MatchedField>,
    pub missing_required: Vec<String>,
}

impl Classification {
    pub fn has_missing_required(&self) -> bool {
        !self.missing_required.is_empty()
    }
}

pub fn classify(params: &ParameterSet, registry: &SchemaRegistry) -> Classification {
    Classification {
        standard: matched(params, registry, registry.standard_keys()),
        custom: matched(params, registry, registry.custom_definition_keys()),
        unused: registry
            .standard_keys()
            .iter()
            .chain(registry.custom_definition_keys())
            .filter(|key| !params.has_values(key))
            .cloned()
            .collect(),
        unknown: params
            .iter()
            .filter(|(key, _)| !registry.is_known(key))
            .map(|(key, values)| MatchedField {
                key: key.to_string(),
                label: None,
                values: values.to_vec(),
            })
            .collect(),
        missing_required: registry
            .required_keys()
            .iter()
            .filter(|key| !params.contains(key))
            .cloned()
            .collect(),
    }
}

fn matched(params: &ParameterSet, registry: &SchemaRegistry, keys: &[String]) -> Vec<MatchedField> {
    keys.iter()
        .filter_map(|key| {
            let values = params.values(key).filter(|v| !v.is_empty())?;
            Some(MatchedField {
                key: key.clone(),
                label: registry.label(key).map(str::to_string),
                values: values.to_vec(),
            })
        })
        .collect()
}
