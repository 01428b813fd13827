//! # Beacon Core
//!
//! Classification and reporting for analytics beacons.
//!
//! ## Pipeline
//!
//! ```text
//! ParameterSet (query + form body)
//!     │
//!     ├──> Classifier (against SchemaRegistry)
//!     │      └─> standard / custom / unused / unknown / missing-required
//!     │
//!     ├──> Report Formatter
//!     │      └─> fixed-width text report
//!     │
//!     └──> Alert Gate (missing-required + cooldown)
//!            └─> Fire | Suppressed | NotRequired
//! ```
//!
//! ## Example
//!
//! ```
//! use beacon_core::{classify, render, HeaderList, ParameterSet, RequestMeta, SchemaRegistry};
//!
//! let registry = SchemaRegistry::analytics();
//! let params = ParameterSet::from_urlencoded(b"v=1&tid=UA-1&cid=abc&dp=%2Fhome");
//! let classification = classify(&params, &registry);
//! assert_eq!(classification.missing_required, vec!["t".to_string()]);
//!
//! let report = render(&RequestMeta::default(), &HeaderList::default(), &classification);
//! assert!(report.contains("Required but Missing:"));
//! ```

mod alert;
mod classify;
mod params;
mod registry;
mod report;

pub use alert::{AlertDecision, AlertGate, AlertSnapshot, DEFAULT_ALERT_COOLDOWN};
pub use classify::{classify, Classification, MatchedField};
pub use params::ParameterSet;
pub use registry::{SchemaEntry, SchemaRegistry};
pub use report::{
    canonical_header_name, render, wrap_value, HeaderList, RequestMeta, BANNER_WIDTH,
    CONTINUATION_INDENT, LABEL_WIDTH, NO_VALUE,
};
