use crate::core::tokenizer::{is_well_formed_name, split_name_field, RecordTokenizer};
use crate::domain::model::{
    ProtocolEntry, RawRecord, RegistrySnapshot, ServiceEntry, SourceDocument, SourceKind,
    Transport, Version,
};
use crate::domain::ports::ConflictPolicy;
use crate::utils::error::{IanaError, Result};
use regex::Regex;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Records whose description (or protocol name) matches this are not real
/// assignments.
const IGNORE_PATTERN: &str = r"(?i)unassigned|deprecated|reserved|historic";

pub const DEFAULT_MAX_COMMENT_LENGTH: usize = 70;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformOptions {
    pub conflict_policy: ConflictPolicy,
    /// Comments must be shorter than this many characters to be emitted.
    pub max_comment_length: usize,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            conflict_policy: ConflictPolicy::default(),
            max_comment_length: DEFAULT_MAX_COMMENT_LENGTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ServiceKey {
    port: u16,
    transport: Transport,
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.port, self.transport)
    }
}

/// A parsed record waiting for deduplication.
#[derive(Debug)]
struct Candidate {
    index: usize,
    name: String,
    aliases: Vec<String>,
    comment: Option<String>,
}

impl Candidate {
    fn describe(&self) -> String {
        format!("record #{} '{}'", self.index, self.name)
    }
}

/// Appends the aliases not seen yet, keeping their relative order.
fn merge_aliases(
    aliases: &mut Vec<String>,
    canonical: &str,
    incoming: impl IntoIterator<Item = String>,
) {
    for alias in incoming {
        if alias != canonical && !aliases.contains(&alias) {
            aliases.push(alias);
        }
    }
}

/// Keyed collection enforcing one entry per key.
struct Deduplicator<K> {
    source_name: &'static str,
    policy: ConflictPolicy,
    entries: BTreeMap<K, Candidate>,
}

impl<K: Ord + fmt::Display> Deduplicator<K> {
    fn new(source_name: &'static str, policy: ConflictPolicy) -> Self {
        Self {
            source_name,
            policy,
            entries: BTreeMap::new(),
        }
    }

    fn insert(&mut self, key: K, incoming: Candidate) -> Result<()> {
        let mut slot = match self.entries.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(incoming);
                return Ok(());
            }
            Entry::Occupied(slot) => slot,
        };

        let key_text = slot.key().to_string();
        let existing = slot.get_mut();

        if existing.name == incoming.name {
            tracing::debug!(
                "Merging {} into {} on {}",
                incoming.describe(),
                existing.describe(),
                key_text
            );
            merge_aliases(&mut existing.aliases, &existing.name, incoming.aliases);
            if existing.comment.is_none() {
                existing.comment = incoming.comment;
            }
            return Ok(());
        }

        match self.policy {
            ConflictPolicy::Strict => Err(IanaError::DuplicateKeyError {
                source_name: self.source_name.to_string(),
                key: key_text,
                existing: existing.describe(),
                incoming: incoming.describe(),
            }),
            ConflictPolicy::Alias => {
                tracing::debug!(
                    "Folding {} into {} as alias on {}",
                    incoming.describe(),
                    existing.describe(),
                    key_text
                );
                let names = std::iter::once(incoming.name).chain(incoming.aliases);
                merge_aliases(&mut existing.aliases, &existing.name, names);
                Ok(())
            }
            ConflictPolicy::FirstWins => {
                tracing::debug!(
                    "Dropping {} in favour of {} on {}",
                    incoming.describe(),
                    existing.describe(),
                    key_text
                );
                Ok(())
            }
        }
    }

    fn into_entries(self) -> impl Iterator<Item = (K, Candidate)> {
        self.entries.into_iter()
    }
}

/// Removes protocol aliases that name another protocol, such as `IPv4` in
/// `ISIS over IPv4`. An alias shared by several entries stays with the lowest
/// number.
fn drop_foreign_aliases(entries: &mut [ProtocolEntry]) {
    let canonical: HashMap<String, u8> = entries
        .iter()
        .map(|entry| (entry.name.to_lowercase(), entry.number))
        .collect();
    let mut claimed: HashMap<String, u8> = HashMap::new();

    for entry in entries.iter_mut() {
        let number = entry.number;
        entry.aliases.retain(|alias| {
            let key = alias.to_lowercase();
            let owner = canonical.get(&key).or_else(|| claimed.get(&key)).copied();
            if let Some(owner) = owner.filter(|owner| *owner != number) {
                tracing::debug!(
                    "Dropping alias '{}' of protocol {}: it names protocol {}",
                    alias,
                    number,
                    owner
                );
                return false;
            }
            claimed.insert(key, number);
            true
        });
    }
}

/// Parses a number field. Ranges (`6000-6063`) resolve to their first value.
fn parse_key<T: FromStr>(raw: &str) -> Option<T> {
    let first = raw.split('-').next()?.trim();
    if first.is_empty() || !first.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    first.parse().ok()
}

/// Turns registry documents into deduplicated, sorted entries.
///
/// A transformer owns its compiled patterns and lives for one run.
pub struct Transformer {
    tokenizer: RecordTokenizer,
    ignore: Regex,
    options: TransformOptions,
}

impl Transformer {
    pub fn new(options: TransformOptions) -> Result<Self> {
        Ok(Self {
            tokenizer: RecordTokenizer::new()?,
            ignore: Regex::new(IGNORE_PATTERN)?,
            options,
        })
    }

    pub fn snapshot(&self, documents: Vec<SourceDocument>) -> Result<RegistrySnapshot> {
        let protocols_doc = Self::document(&documents, SourceKind::Protocols)?;
        let services_doc = Self::document(&documents, SourceKind::Services)?;

        let version = self.version(protocols_doc)?.max(self.version(services_doc)?);
        let protocols = self.protocols(protocols_doc)?;
        let services = self.services(services_doc)?;

        Ok(RegistrySnapshot {
            protocols,
            services,
            version,
            sources: documents,
        })
    }

    fn document(documents: &[SourceDocument], kind: SourceKind) -> Result<&SourceDocument> {
        documents
            .iter()
            .find(|doc| doc.kind == kind)
            .ok_or_else(|| IanaError::MalformedDocumentError {
                source_name: kind.name().to_string(),
                reason: "document was not fetched".to_string(),
            })
    }

    pub fn version(&self, document: &SourceDocument) -> Result<Version> {
        let updated = self.tokenizer.updated(&document.body).ok_or_else(|| {
            IanaError::MalformedDocumentError {
                source_name: document.kind.name().to_string(),
                reason: "missing <updated> date".to_string(),
            }
        })?;

        Version::parse_updated(&updated).ok_or_else(|| IanaError::MalformedDocumentError {
            source_name: document.kind.name().to_string(),
            reason: format!("invalid <updated> date '{}'", updated),
        })
    }

    pub fn protocols(&self, document: &SourceDocument) -> Result<Vec<ProtocolEntry>> {
        let records = self.tokenizer.tokenize(&document.body);
        let total = records.len();
        let mut registry = Deduplicator::new("protocols", self.options.conflict_policy);

        for record in &records {
            if let Some((number, candidate)) = self.protocol_candidate(record)? {
                registry.insert(number, candidate)?;
            }
        }

        let mut entries: Vec<ProtocolEntry> = registry
            .into_entries()
            .map(|(number, candidate)| ProtocolEntry {
                name: candidate.name,
                number,
                aliases: candidate.aliases,
                comment: candidate.comment,
            })
            .collect();
        drop_foreign_aliases(&mut entries);

        tracing::info!(
            "🧮 Parsed {} protocol entries from {} records",
            entries.len(),
            total
        );
        Ok(entries)
    }

    pub fn services(&self, document: &SourceDocument) -> Result<Vec<ServiceEntry>> {
        let records = self.tokenizer.tokenize(&document.body);
        let total = records.len();
        let mut registry = Deduplicator::new("services", self.options.conflict_policy);

        for record in &records {
            if let Some((key, candidate)) = self.service_candidate(record)? {
                registry.insert(key, candidate)?;
            }
        }

        let entries: Vec<ServiceEntry> = registry
            .into_entries()
            .map(|(key, candidate)| ServiceEntry {
                name: candidate.name,
                port: key.port,
                transport: key.transport,
                aliases: candidate.aliases,
                comment: candidate.comment,
            })
            .collect();

        tracing::info!(
            "🧮 Parsed {} service entries from {} records",
            entries.len(),
            total
        );
        Ok(entries)
    }

    fn protocol_candidate(&self, record: &RawRecord) -> Result<Option<(u8, Candidate)>> {
        let Some(raw_name) = record.name.as_deref() else {
            tracing::debug!("Skipping protocol record #{}: no name", record.index);
            return Ok(None);
        };

        if self.is_ignored(record.description.as_deref()) || self.ignore.is_match(raw_name) {
            tracing::debug!(
                "Skipping protocol record #{} '{}': not assigned",
                record.index,
                raw_name
            );
            return Ok(None);
        }

        let field = split_name_field(raw_name);
        if field.names.is_empty() || !field.names.iter().all(|n| is_well_formed_name(n)) {
            tracing::debug!(
                "Skipping protocol record #{}: bad name '{}'",
                record.index,
                raw_name
            );
            return Ok(None);
        }

        let Some(raw_value) = record.value.as_deref() else {
            tracing::debug!(
                "Skipping protocol record #{} '{}': no value",
                record.index,
                raw_name
            );
            return Ok(None);
        };

        let number = parse_key::<u8>(raw_value).ok_or_else(|| IanaError::MalformedRecordError {
            source_name: "protocols".to_string(),
            index: record.index,
            reason: format!("protocol number '{}' is not in 0-255", raw_value),
        })?;

        // 正式名稱小寫，原始大小寫保留為別名 (例如 tcp 6 TCP)
        let name = field.names[0].to_lowercase();
        let mut aliases = Vec::new();
        merge_aliases(&mut aliases, &name, field.names.iter().cloned());

        Ok(Some((
            number,
            Candidate {
                index: record.index,
                name,
                aliases,
                comment: self.comment(record.description.as_deref(), field.comment.as_deref()),
            },
        )))
    }

    fn service_candidate(&self, record: &RawRecord) -> Result<Option<(ServiceKey, Candidate)>> {
        let Some(raw_name) = record.name.as_deref() else {
            tracing::debug!("Skipping service record #{}: no name", record.index);
            return Ok(None);
        };

        if self.is_ignored(record.description.as_deref()) {
            tracing::debug!(
                "Skipping service record #{} '{}': not assigned",
                record.index,
                raw_name
            );
            return Ok(None);
        }

        let field = split_name_field(raw_name);
        let names: Vec<String> = field
            .names
            .iter()
            .map(|n| n.to_lowercase().replace('_', "-"))
            .collect();
        if names.is_empty() || !names.iter().all(|n| is_well_formed_name(n)) {
            tracing::debug!(
                "Skipping service record #{}: bad name '{}'",
                record.index,
                raw_name
            );
            return Ok(None);
        }

        let Some(transport) = record.protocol.as_deref().and_then(Transport::parse) else {
            tracing::debug!(
                "Skipping service record #{} '{}': no transport",
                record.index,
                raw_name
            );
            return Ok(None);
        };

        let Some(raw_port) = record.number.as_deref() else {
            tracing::debug!(
                "Skipping service record #{} '{}': no port",
                record.index,
                raw_name
            );
            return Ok(None);
        };

        let port = parse_key::<u16>(raw_port).ok_or_else(|| IanaError::MalformedRecordError {
            source_name: "services".to_string(),
            index: record.index,
            reason: format!("port '{}' is not in 0-65535", raw_port),
        })?;

        let mut names = names.into_iter();
        let name = names.next().unwrap_or_default();
        let mut aliases = Vec::new();
        merge_aliases(&mut aliases, &name, names);

        Ok(Some((
            ServiceKey { port, transport },
            Candidate {
                index: record.index,
                name,
                aliases,
                comment: self.comment(record.description.as_deref(), field.comment.as_deref()),
            },
        )))
    }

    fn is_ignored(&self, description: Option<&str>) -> bool {
        description.is_some_and(|d| self.ignore.is_match(d))
    }

    fn comment(&self, description: Option<&str>, trailing: Option<&str>) -> Option<String> {
        description
            .or(trailing)
            .map(str::trim)
            .filter(|c| !c.is_empty() && c.chars().count() < self.options.max_comment_length)
            .map(str::to_string)
    }
}
