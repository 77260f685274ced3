use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Which IANA registry a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    Protocols,
    Services,
}

impl SourceKind {
    /// File name the raw document is saved under.
    pub fn xml_file_name(&self) -> &'static str {
        match self {
            SourceKind::Protocols => "protocol-numbers.xml",
            SourceKind::Services => "service-names-port-numbers.xml",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Protocols => "protocols",
            SourceKind::Services => "services",
        }
    }
}

/// A registry document exactly as fetched from upstream.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub kind: SourceKind,
    pub url: String,
    pub body: String,
}

/// One `<record>` of a registry document, with text fields already
/// stripped of markup and entity-decoded. Missing child elements are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    /// Position of the record in its document, starting at 1.
    pub index: usize,
    pub name: Option<String>,
    pub protocol: Option<String>,
    pub number: Option<String>,
    pub value: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transport {
    Tcp,
    Udp,
    Sctp,
    Dccp,
    Other(String),
}

impl Transport {
    /// Parses a transport name, ignoring case. Returns `None` for text that
    /// cannot be a transport token.
    pub fn parse(raw: &str) -> Option<Self> {
        let lowered = raw.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "tcp" => Some(Transport::Tcp),
            "udp" => Some(Transport::Udp),
            "sctp" => Some(Transport::Sctp),
            "dccp" => Some(Transport::Dccp),
            "" => None,
            other if other.chars().all(|c| c.is_ascii_alphanumeric()) => {
                Some(Transport::Other(other.to_string()))
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Transport::Tcp => "tcp",
            Transport::Udp => "udp",
            Transport::Sctp => "sctp",
            Transport::Dccp => "dccp",
            Transport::Other(name) => name,
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// 依名稱字典序排序，讓輸出與 transport 名稱一致
impl Ord for Transport {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for Transport {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolEntry {
    pub name: String,
    pub number: u8,
    pub aliases: Vec<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub name: String,
    pub port: u16,
    pub transport: Transport,
    pub aliases: Vec<String>,
    pub comment: Option<String>,
}

impl ServiceEntry {
    pub fn key(&self) -> (u16, Transport) {
        (self.port, self.transport.clone())
    }
}

/// Upstream snapshot date, rendered as `YYYYMMDD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(pub NaiveDate);

impl Version {
    /// Parses the `YYYY-MM-DD` form used by the registry `<updated>` element.
    pub fn parse_updated(raw: &str) -> Option<Self> {
        NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .ok()
            .map(Version)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y%m%d"))
    }
}

#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    pub protocols: Vec<ProtocolEntry>,
    pub services: Vec<ServiceEntry>,
    pub version: Version,
    pub sources: Vec<SourceDocument>,
}

/// Result of the load stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Written,
    /// Output directory already held identical files for this version.
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub version: Version,
    pub protocols: usize,
    pub services: usize,
    pub outcome: LoadOutcome,
    pub output_path: String,
}

/// A file the emitter wants placed in the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub name: String,
    pub contents: Vec<u8>,
}

impl OutputFile {
    pub fn new(name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }
}
