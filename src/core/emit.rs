use crate::domain::model::{
    OutputFile, ProtocolEntry, RegistrySnapshot, ServiceEntry, SourceKind, Version,
};
use crate::utils::error::{IanaError, Result};
use flate2::{Compression, GzBuilder};
use sha2::{Digest, Sha256};

pub const PROTOCOLS_FILE: &str = "protocols";
pub const SERVICES_FILE: &str = "services";
pub const VERSION_FILE: &str = ".version";
/// Generated files and release artifacts live here; sources and `.version` do not.
pub const DIST_DIR: &str = "dist";

const PROTOCOLS_HEADER: &str = "# See also protocols(5) and IANA official page :
# https://www.iana.org/assignments/protocol-numbers/protocol-numbers.xhtml
";

const SERVICES_HEADER: &str = "# See also services(5) and IANA official page :
# https://www.iana.org/assignments/service-names-port-numbers/service-names-port-numbers.xhtml
";

const NAME_WIDTH: usize = 16;
const PROTOCOL_ASSIGNMENT_WIDTH: usize = 16;
const SERVICE_ASSIGNMENT_WIDTH: usize = 10;

fn format_line(
    name: &str,
    key: String,
    aliases: &[String],
    comment: Option<&str>,
    width: usize,
) -> String {
    let mut assignment = key;
    for alias in aliases {
        assignment.push(' ');
        assignment.push_str(alias);
    }

    let mut line = format!(
        "{:<name_width$} {:<width$}",
        name,
        assignment,
        name_width = NAME_WIDTH
    );
    if let Some(comment) = comment {
        line.push_str(" # ");
        line.push_str(comment);
    }

    line.truncate(line.trim_end().len());
    line.push('\n');
    line
}

/// `/etc/protocols` text: `name number aliases # comment` per line.
pub fn render_protocols(entries: &[ProtocolEntry]) -> String {
    let mut out = String::from(PROTOCOLS_HEADER);
    for entry in entries {
        out.push_str(&format_line(
            &entry.name,
            entry.number.to_string(),
            &entry.aliases,
            entry.comment.as_deref(),
            PROTOCOL_ASSIGNMENT_WIDTH,
        ));
    }
    out
}

/// `/etc/services` text: `name port/transport aliases # comment` per line.
pub fn render_services(entries: &[ServiceEntry]) -> String {
    let mut out = String::from(SERVICES_HEADER);
    for entry in entries {
        out.push_str(&format_line(
            &entry.name,
            format!("{}/{}", entry.port, entry.transport),
            &entry.aliases,
            entry.comment.as_deref(),
            SERVICE_ASSIGNMENT_WIDTH,
        ));
    }
    out
}

pub fn render_version(version: &Version) -> String {
    format!("{}\n", version)
}

pub fn release_name(version: &Version) -> String {
    format!("iana-etc-{}", version)
}

/// Path of a release file relative to the output directory.
pub fn dist_path(name: &str) -> String {
    format!("{}/{}", DIST_DIR, name)
}

pub fn archive_file_name(version: &Version) -> String {
    format!("{}.tar.gz", release_name(version))
}

pub fn checksum_file_name(version: &Version) -> String {
    format!("{}.sha256", archive_file_name(version))
}

/// Root-owned, mode 0644, mtime 0, so the same inputs give the same bytes.
fn archive_entry_header(size: usize) -> Result<tar::Header> {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(size as u64);
    header.set_mode(0o644);
    header.set_uid(0);
    header.set_gid(0);
    header.set_username("root").map_err(IanaError::ArchiveError)?;
    header.set_groupname("root").map_err(IanaError::ArchiveError)?;
    header.set_mtime(0);
    Ok(header)
}

/// Packs `entries` under a `<prefix>/` directory into a gzip tarball.
pub fn build_archive(prefix: &str, entries: &[(&str, &[u8])]) -> Result<Vec<u8>> {
    // gzip 標頭時間固定為 0
    let encoder = GzBuilder::new()
        .mtime(0)
        .write(Vec::new(), Compression::default());
    let mut tar = tar::Builder::new(encoder);

    for (name, data) in entries {
        let mut header = archive_entry_header(data.len())?;
        tar.append_data(&mut header, format!("{}/{}", prefix, name), *data)
            .map_err(IanaError::ArchiveError)?;
    }

    let encoder = tar.into_inner().map_err(IanaError::ArchiveError)?;
    encoder.finish().map_err(IanaError::ArchiveError)
}

/// Hex SHA-256 digest of `data`, without file name or newline.
pub fn checksum(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Rendered text outputs for one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFiles {
    pub protocols: String,
    pub services: String,
    pub version: String,
}

impl RenderedFiles {
    pub fn new(snapshot: &RegistrySnapshot) -> Self {
        Self {
            protocols: render_protocols(&snapshot.protocols),
            services: render_services(&snapshot.services),
            version: render_version(&snapshot.version),
        }
    }
}

pub struct Emitter {
    archive: bool,
}

impl Emitter {
    pub fn new(archive: bool) -> Self {
        Self { archive }
    }

    /// Every file to write for `snapshot`, in commit order. An artifact is
    /// renamed before anything that refers to it, and the version marker
    /// comes last so it only changes once everything else is in place.
    pub fn plan(
        &self,
        snapshot: &RegistrySnapshot,
        rendered: &RenderedFiles,
    ) -> Result<Vec<OutputFile>> {
        let mut files = Vec::new();

        if self.archive {
            let release = release_name(&snapshot.version);
            let mut entries: Vec<(&str, &[u8])> = Vec::new();

            for source in &snapshot.sources {
                files.push(OutputFile::new(
                    source.kind.xml_file_name(),
                    source.body.as_bytes(),
                ));
            }

            for kind in [SourceKind::Services, SourceKind::Protocols] {
                if let Some(source) = snapshot.sources.iter().find(|s| s.kind == kind) {
                    entries.push((kind.xml_file_name(), source.body.as_bytes()));
                }
                entries.push(match kind {
                    SourceKind::Services => (SERVICES_FILE, rendered.services.as_bytes()),
                    SourceKind::Protocols => (PROTOCOLS_FILE, rendered.protocols.as_bytes()),
                });
            }

            let archive = build_archive(&release, &entries)?;
            let digest = checksum(&archive);
            let archive_name = archive_file_name(&snapshot.version);
            tracing::debug!(
                "Built {} ({} bytes, sha256 {})",
                archive_name,
                archive.len(),
                digest
            );

            files.push(OutputFile::new(dist_path(&archive_name), archive));
            files.push(OutputFile::new(
                dist_path(&checksum_file_name(&snapshot.version)),
                digest,
            ));
        }

        files.push(OutputFile::new(
            dist_path(PROTOCOLS_FILE),
            rendered.protocols.as_bytes(),
        ));
        files.push(OutputFile::new(
            dist_path(SERVICES_FILE),
            rendered.services.as_bytes(),
        ));
        files.push(OutputFile::new(VERSION_FILE, rendered.version.as_bytes()));

        Ok(files)
    }
}
