use crate::classify::{Classification, MatchedField};

/// Right-aligned width of the label column. Values start right after `" = "`.
pub const LABEL_WIDTH: usize = 40;
/// Indent of continuation lines, lining them up under the first value chunk.
pub const CONTINUATION_INDENT: usize = LABEL_WIDTH + 3;
pub const BANNER_WIDTH: usize = 92;
pub const NO_VALUE: &str = "<no-value>";

const UNUSED_PER_LINE: usize = 20;
const UNUSED_INDENT: usize = 10;
const CENTER_WIDTH: usize = 80;
/// Missing-key lines shorter than this are centered within [`CENTER_WIDTH`].
const CENTER_THRESHOLD: usize = 40;

/// Keys whose first value is shown on its own, wrapped.
const FIRST_VALUE_KEYS: &[&str] = &["dl", "dr"];
const FIRST_VALUE_HEADERS: &[&str] = &["User-Agent", "Referer"];

/// Transport-level facts about the beacon request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    pub source: String,
    pub host: String,
    pub method: String,
    pub path: String,
}

/// Request headers in arrival order, grouped by canonical name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList {
    entries: Vec<(String, Vec<String>)>,
}

impl HeaderList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &str, value: impl Into<String>) {
        let name = canonical_header_name(name);
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, values)) => values.push(value.into()),
            None => self.entries.push((name, vec![value.into()])),
        }
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        let name = canonical_header_name(name);
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: AsRef<str>, V: Into<String>> FromIterator<(N, V)> for HeaderList {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut list = HeaderList::new();
        for (name, value) in iter {
            list.push(name.as_ref(), value);
        }
        list
    }
}

/// `x-forwarded-for` -> `X-Forwarded-For`.
///
/// Names containing anything other than ASCII alphanumerics and `-` are returned unchanged.
pub fn canonical_header_name(name: &str) -> String {
    if !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        return name.to_string();
    }
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if upper {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c.to_ascii_lowercase());
        }
        upper = c == '-';
    }
    out
}

/// Splits `value` into [`LABEL_WIDTH`]-character chunks.
///
/// Values shorter than the width come back whole; the last chunk may be shorter.
pub fn wrap_value(value: &str) -> Vec<String> {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() < LABEL_WIDTH {
        return vec![value.to_string()];
    }
    chars
        .chunks(LABEL_WIDTH)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Renders the full text report for one beacon.
///
/// Output depends only on the arguments, so the same input always yields the same bytes.
pub fn render(meta: &RequestMeta, headers: &HeaderList, result: &Classification) -> String {
    let mut out = String::new();
    out.push('\n');
    out.push_str(&"*".repeat(BANNER_WIDTH));
    out.push('\n');

    out.push_str("HTTP Vars:\n");
    push_field(&mut out, "source", or_placeholder(&meta.source));
    push_field(&mut out, "host", or_placeholder(&meta.host));
    push_field(&mut out, "method", or_placeholder(&meta.method));
    push_field(&mut out, "path", or_placeholder(&meta.path));

    out.push_str("HTTP Headers:\n");
    if headers.is_empty() {
        push_none(&mut out);
    }
    for (name, values) in headers.iter() {
        let value = if FIRST_VALUE_HEADERS.contains(&name) {
            values.first().cloned().unwrap_or_default()
        } else {
            values.join(",")
        };
        push_field(&mut out, name, &value);
    }

    out.push_str("Standard Google Analytics Vars:\n");
    push_matched(&mut out, &result.standard);
    push_test_line(&mut out, result);

    out.push_str("Custom Definitions:\n");
    push_matched(&mut out, &result.custom);

    out.push_str("Unused:\n");
    push_unused(&mut out, &result.unused);

    out.push_str("Unknown:\n");
    push_matched(&mut out, &result.unknown);

    out.push_str("Required but Missing:\n");
    push_missing(&mut out, &result.missing_required);

    out
}

fn or_placeholder(value: &str) -> &str {
    if value.is_empty() {
        NO_VALUE
    } else {
        value
    }
}

fn push_field(out: &mut String, label: &str, value: &str) {
    out.push_str(&format!("{:>width$} = ", label, width = LABEL_WIDTH));
    for (i, chunk) in wrap_value(value).iter().enumerate() {
        if i > 0 {
            out.push_str(&" ".repeat(CONTINUATION_INDENT));
        }
        out.push_str(chunk);
        out.push('\n');
    }
}

// The trailing newline counts toward the column width.
fn push_none(out: &mut String) {
    out.push_str(&format!("{:>1$}", "None\n", LABEL_WIDTH));
}

fn push_matched(out: &mut String, fields: &[MatchedField]) {
    if fields.is_empty() {
        push_none(out);
        return;
    }
    for field in fields {
        let label = match &field.label {
            Some(label) => format!("{label} ({})", field.key),
            None => field.key.clone(),
        };
        let value = if field.values.is_empty() {
            NO_VALUE.to_string()
        } else if FIRST_VALUE_KEYS.contains(&field.key.as_str()) {
            field.values[0].clone()
        } else {
            field.values.join(", ")
        };
        push_field(out, &label, &value);
    }
}

fn push_test_line(out: &mut String, result: &Classification) {
    let first = |key: &str| {
        result
            .standard
            .iter()
            .find(|f| f.key == key)
            .and_then(|f| f.values.first())
            .map_or(NO_VALUE, String::as_str)
    };
    out.push_str(&format!("For test: cid={} dp={}\n", first("cid"), first("dp")));
}

fn push_unused(out: &mut String, keys: &[String]) {
    if keys.is_empty() {
        push_none(out);
        return;
    }
    out.push_str(&" ".repeat(UNUSED_INDENT));
    for line in keys.chunks(UNUSED_PER_LINE) {
        for key in line {
            out.push_str(key);
            out.push(' ');
        }
        out.push('\n');
    }
}

fn push_missing(out: &mut String, keys: &[String]) {
    if keys.is_empty() {
        push_none(out);
        return;
    }
    let mut line: String = keys.iter().map(|k| format!("{k} ")).collect();
    line.push('\n');
    let len = line.chars().count();
    if len < CENTER_THRESHOLD {
        out.push_str(&" ".repeat((CENTER_WIDTH - len) / 2));
    }
    out.push_str(&line);
}
