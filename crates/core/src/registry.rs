use std::collections::{HashMap, HashSet};

/// A known parameter key and its human-readable label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaEntry {
    pub key: String,
    pub label: String,
}

const ANALYTICS_STANDARD: &[(&str, &str)] = &[
    ("v", "Analytics Api Version"),
    ("tid", "Analytics Account Id"),
    ("cid", "Client Id"),
    ("ai", "Anonymize IP"),
    ("sc", "Session Control"),
    ("dr", "Document Referrer"),
    ("cn", "Campaign Name"),
    ("cs", "Campaign Source"),
    ("cm", "Campaign Medium"),
    ("ck", "Campaign Keyword"),
    ("cc", "Campaign Content"),
    ("ci", "Campaign Id"),
    ("sr", "Screen Resolution"),
    ("vp", "Viewport Size"),
    ("de", "Document Encoding"),
    ("dl", "Document Location Url"),
    ("sd", "Screen Colors"),
    ("ul", "User Language"),
    ("je", "Java Enabled"),
    ("fl", "Flash Version"),
    ("t", "Hit Type"),
    ("ni", "Non-Interaction Hit"),
    ("dh", "Document Host Name"),
    ("dp", "Document Path"),
    ("dt", "Document Title"),
    ("an", "Application Name"),
    ("av", "Application Version"),
    ("ec", "Event Category"),
    ("ea", "Event Action"),
    ("el", "Event Label"),
    ("ev", "Event Value"),
    ("sn", "Social Network"),
    ("sa", "Social Action"),
    ("st", "Social Action Target"),
    ("utc", "User Timing Category"),
    ("utv", "User Timing Variable Name"),
    ("utt", "User Timing Time"),
    ("utl", "User Timing Label"),
    ("exd", "Exception Description"),
    ("exf", "Is Exception Fatal?"),
    ("z", "Cache Buster"),
];

const ANALYTICS_CUSTOM: &[&str] = &[
    "cd1", "cd2", "cd3", "cd4", "cd5", "cd6", "cd7", "cd8", "cd9", "cd10", "cd11", "cd12",
];

const ANALYTICS_REQUIRED: &[&str] = &["v", "cid", "t"];

/// Read-only table of known beacon parameters.
///
/// Built once at start-up and shared by reference. The ordered key lists drive report order;
/// the known-key set is derived from them and is only used for unknown detection.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    labels: HashMap<String, String>,
    standard: Vec<String>,
    custom: Vec<String>,
    required: Vec<String>,
    known: HashSet<String>,
}

impl SchemaRegistry {
    /// Builds a registry from ordered `(key, label)` tables.
    ///
    /// A key listed twice keeps its first label and its first position.
    /// `required` may name keys outside both tables; they are checked for presence only.
    pub fn new<K, L, R>(standard: &[(K, L)], custom: &[(K, L)], required: &[R]) -> Self
    where
        K: AsRef<str>,
        L: AsRef<str>,
        R: AsRef<str>,
    {
        let mut labels = HashMap::new();
        let mut known = HashSet::new();
        let mut collect = |table: &[(K, L)]| -> Vec<String> {
            let mut keys = Vec::with_capacity(table.len());
            for (key, label) in table {
                let key = key.as_ref();
                if known.insert(key.to_string()) {
                    labels.insert(key.to_string(), label.as_ref().to_string());
                    keys.push(key.to_string());
                }
            }
            keys
        };
        let standard = collect(standard);
        let custom = collect(custom);
        let required = required.iter().map(|k| k.as_ref().to_string()).collect();

        Self {
            labels,
            standard,
            custom,
            required,
            known,
        }
    }

    /// The Measurement Protocol subset this collector understands.
    pub fn analytics() -> Self {
        let custom: Vec<(&str, &str)> = ANALYTICS_CUSTOM.iter().map(|k| (*k, *k)).collect();
        Self::new(ANALYTICS_STANDARD, &custom[..], ANALYTICS_REQUIRED)
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn standard_keys(&self) -> &[String] {
        &self.standard
    }

    pub fn custom_definition_keys(&self) -> &[String] {
        &self.custom
    }

    pub fn required_keys(&self) -> &[String] {
        &self.required
    }

    pub fn known_key_set(&self) -> &HashSet<String> {
        &self.known
    }

    pub fn is_known(&self, key: &str) -> bool {
        self.known.contains(key)
    }

    /// Standard entries followed by custom-definition entries, in registry order.
    pub fn entries(&self) -> impl Iterator<Item = SchemaEntry> + '_ {
        self.standard
            .iter()
            .chain(self.custom.iter())
            .map(|key| SchemaEntry {
                key: key.clone(),
                label: self.labels.get(key).cloned().unwrap_or_default(),
            })
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::analytics()
    }
}
