//! Column 9 codec for both annotation dialects.
//!
//! - GFF3: `key=value;key2=value2` (values percent-encoded)
//! - GTF:  `key "value"; key2 "value2";`
//!
//! Decoding keeps insertion order; GTF encoding always leads with
//! `gene_id` then `transcript_id`.

use indexmap::IndexMap;

/// Ordered attribute mapping, first occurrence decides the position.
pub type Attributes = IndexMap<String, String>;

/// Attribute keys emitted first, in this order, on GTF lines.
pub const GTF_LEADING_KEYS: [&str; 2] = ["gene_id", "transcript_id"];

/// File dialect detected from attribute syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Gff3,
    Gtf,
    Unknown,
}

impl Dialect {
    /// Guess the dialect from the first attribute entry.
    ///
    /// GFF3 if the first entry has `=` before any whitespace or quote,
    /// GTF if it is a whitespace separated key/value pair.
    pub fn detect(s: &str) -> Dialect {
        let Some(first) = split_entries(s).into_iter().next() else {
            return Dialect::Unknown;
        };
        let eq = first.find('=');
        let ws = first.find(|c: char| c.is_whitespace() || c == '"');
        match (eq, ws) {
            (Some(e), Some(w)) if e < w => Dialect::Gff3,
            (Some(_), None) => Dialect::Gff3,
            (_, Some(_)) => Dialect::Gtf,
            (None, None) => Dialect::Unknown,
        }
    }
}

/// Parse the attributes field for either GFF3 or GTF.
///
/// Returns (Dialect, map). A lone `.` or empty column gives an empty map.
pub fn parse_attributes(s: &str) -> (Dialect, Attributes) {
    let s = s.trim();
    let mut map = Attributes::new();
    if s.is_empty() || s == "." {
        return (Dialect::Unknown, map);
    }

    let dialect = Dialect::detect(s);

    for part in split_entries(s) {
        let (key, value) = match dialect {
            Dialect::Gff3 => match part.split_once('=') {
                Some((k, v)) => (k.trim(), url_decode(v.trim())),
                None => (part, String::new()),
            },
            Dialect::Gtf | Dialect::Unknown => {
                let mut it = part.splitn(2, char::is_whitespace);
                let key = it.next().unwrap_or("").trim();
                (key, unquote(it.next().unwrap_or("")))
            }
        };
        if !key.is_empty() {
            map.insert(key.to_string(), value);
        }
    }

    (dialect, map)
}

/// Encode as a GTF attribute column: `gene_id "G"; transcript_id "T"; k "v"`.
pub fn encode_gtf(attrs: &Attributes) -> String {
    let leading = GTF_LEADING_KEYS
        .iter()
        .filter_map(|k| attrs.get_key_value(*k));
    let rest = attrs
        .iter()
        .filter(|(k, _)| !GTF_LEADING_KEYS.contains(&k.as_str()));

    leading
        .chain(rest)
        .map(|(k, v)| format!("{} \"{}\"", k, v.replace('"', "\\\"")))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Encode as a GFF3 attribute column: `k=v;k2=v2`, reserved characters escaped.
pub fn encode_gff3(attrs: &Attributes) -> String {
    attrs
        .iter()
        .map(|(k, v)| format!("{}={}", url_encode(k), url_encode(v)))
        .collect::<Vec<_>>()
        .join(";")
}

/// Split on `;` outside of double quotes, dropping empty entries.
fn split_entries(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut begin = 0;
    for (i, c) in s.char_indices() {
        match c {
            '\\' if in_quotes => escaped = !escaped,
            '"' if !escaped => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                out.push(&s[begin..i]);
                begin = i + 1;
            }
            _ => {}
        }
        if c != '\\' {
            escaped = false;
        }
    }
    out.push(&s[begin..]);
    out.into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

fn unquote(v: &str) -> String {
    let v = v.trim();
    match v.strip_prefix('"').and_then(|inner| inner.strip_suffix('"')) {
        Some(inner) => inner.replace("\\\"", "\""),
        None => v.to_string(),
    }
}

/// Percent-decode a GFF3 value. Malformed escapes are kept literally.
fn url_decode(s: &str) -> String {
    if !s.contains('%') {
        return s.to_string();
    }
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn url_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            ';' | '=' | '&' | ',' | '%' | '\t' | '\n' | '\r' => {
                let mut buf = [0u8; 4];
                for b in c.encode_utf8(&mut buf).bytes() {
                    out.push_str(&format!("%{:02X}", b));
                }
            }
            _ => out.push(c),
        }
    }
    out
}
