use crate::domain::model::RawRecord;
use crate::utils::error::Result;
use regex::{Captures, Regex};

/// Matches an element with the given tag and captures its body. Self-closing
/// elements (`<name/>`) do not match and read as missing.
fn element_pattern(tag: &str) -> String {
    format!(r"(?s)<{tag}(?:\s[^>]*[^/>])?\s*>(.*?)</{tag}\s*>")
}

/// Splits an IANA registry document into [`RawRecord`]s.
///
/// Each `<record>` element yields one raw record carrying the text of its
/// `name`, `protocol`, `number`, `value` and `description` children. Other
/// children are ignored. Text is stripped of nested markup, entity-decoded
/// and whitespace-collapsed; empty text reads as a missing field.
pub struct RecordTokenizer {
    comment: Regex,
    record: Regex,
    updated: Regex,
    name: Regex,
    protocol: Regex,
    number: Regex,
    value: Regex,
    description: Regex,
    markup: Regex,
    numeric_entity: Regex,
}

impl RecordTokenizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            comment: Regex::new(r"(?s)<!--.*?-->")?,
            record: Regex::new(&element_pattern("record"))?,
            updated: Regex::new(&element_pattern("updated"))?,
            name: Regex::new(&element_pattern("name"))?,
            protocol: Regex::new(&element_pattern("protocol"))?,
            number: Regex::new(&element_pattern("number"))?,
            value: Regex::new(&element_pattern("value"))?,
            description: Regex::new(&element_pattern("description"))?,
            markup: Regex::new(r"<[^>]*>")?,
            numeric_entity: Regex::new(r"&#([xX]?)([0-9A-Fa-f]+);")?,
        })
    }

    pub fn tokenize(&self, document: &str) -> Vec<RawRecord> {
        let cleaned = self.comment.replace_all(document, "");

        self.record
            .captures_iter(&cleaned)
            .enumerate()
            .map(|(position, caps)| {
                let body = caps.get(1).map_or("", |m| m.as_str());
                RawRecord {
                    index: position + 1,
                    name: self.field(&self.name, body),
                    protocol: self.field(&self.protocol, body),
                    number: self.field(&self.number, body),
                    value: self.field(&self.value, body),
                    description: self.field(&self.description, body),
                }
            })
            .collect()
    }

    /// The registry-level `<updated>` date text. Records may carry their own
    /// `<updated>`, so the document head is searched first.
    pub fn updated(&self, document: &str) -> Option<String> {
        let cleaned = self.comment.replace_all(document, "");
        let head = match cleaned.find("<record") {
            Some(position) => &cleaned[..position],
            None => &cleaned[..],
        };

        self.field(&self.updated, head)
            .or_else(|| self.field(&self.updated, &cleaned))
    }

    fn field(&self, pattern: &Regex, body: &str) -> Option<String> {
        let raw = pattern.captures(body)?.get(1)?.as_str();
        let text = self.text(raw);
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Plain text of an element body.
    pub fn text(&self, raw: &str) -> String {
        let stripped = self.markup.replace_all(raw, " ");
        let decoded = self.decode_entities(&stripped);
        decoded.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn decode_entities(&self, text: &str) -> String {
        let numeric = self
            .numeric_entity
            .replace_all(text, |caps: &Captures| {
                let code = if caps[1].is_empty() {
                    caps[2].parse::<u32>().ok()
                } else {
                    u32::from_str_radix(&caps[2], 16).ok()
                };
                code.and_then(char::from_u32)
                    .map(String::from)
                    .unwrap_or_else(|| caps[0].to_string())
            });

        // &amp; 最後處理，避免二次解碼
        numeric
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&apos;", "'")
            .replace("&amp;", "&")
    }
}

/// A record's name field split into names and an optional trailing comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameField {
    pub names: Vec<String>,
    pub comment: Option<String>,
}

/// Splits `"name alias1 alias2 # comment"` into its parts.
pub fn split_name_field(raw: &str) -> NameField {
    let (names, comment) = match raw.split_once('#') {
        Some((names, comment)) => (names, Some(comment)),
        None => (raw, None),
    };

    NameField {
        names: names.split_whitespace().map(str::to_string).collect(),
        comment: comment
            .map(|c| c.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|c| !c.is_empty()),
    }
}

/// Names are single printable ASCII tokens.
pub fn is_well_formed_name(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_graphic() && c != '#')
}
