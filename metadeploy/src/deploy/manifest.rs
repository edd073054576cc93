//! Package manifest (`package.xml`) generation and changeset rewriting

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read, Write};

use serde::{Deserialize, Serialize};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::errors::DeployError;
use crate::models::deployment::MetadataSelection;

const METADATA_NAMESPACE: &str = "http://soap.sforce.com/2006/04/metadata";
const MANIFEST_FILE: &str = "package.xml";

/// Components to retrieve, grouped by metadata type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    pub types: BTreeMap<String, BTreeSet<String>>,
    pub version: String,
}

impl PackageManifest {
    /// Build a manifest from a component selection
    pub fn from_selection(selection: &MetadataSelection, api_version: &str) -> Self {
        let types = selection
            .iter()
            .filter(|(_, items)| !items.is_empty())
            .map(|(type_name, items)| {
                let members = items.iter().map(|item| item.full_name.clone()).collect();
                (type_name.clone(), members)
            })
            .collect();

        Self {
            types,
            version: api_version.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Render as `package.xml`
    pub fn to_xml(&self) -> String {
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str(&format!("<Package xmlns=\"{METADATA_NAMESPACE}\">\n"));
        for (type_name, members) in &self.types {
            xml.push_str("    <types>\n");
            for member in members {
                xml.push_str(&format!("        <members>{}</members>\n", escape_xml(member)));
            }
            xml.push_str(&format!("        <name>{}</name>\n", escape_xml(type_name)));
            xml.push_str("    </types>\n");
        }
        xml.push_str(&format!("    <version>{}</version>\n", escape_xml(&self.version)));
        xml.push_str("</Package>\n");
        xml
    }
}

/// Rewrite the manifest inside a retrieved package so the deploy lands in a changeset.
///
/// Every other entry is copied byte for byte.
pub fn rewrite_for_changeset(
    zip_bytes: &[u8],
    changeset_name: &str,
    description: Option<&str>,
) -> Result<Vec<u8>, DeployError> {
    let mut archive = ZipArchive::new(Cursor::new(zip_bytes))
        .map_err(|e| DeployError::ManifestRewriteError(format!("Unreadable package: {e}")))?;

    let manifest_index = find_manifest(&mut archive)?;

    let (manifest_name, manifest_xml) = {
        let mut entry = archive.by_index(manifest_index).map_err(rewrite_error)?;
        let mut xml = String::new();
        entry
            .read_to_string(&mut xml)
            .map_err(|e| DeployError::ManifestRewriteError(format!("Unreadable manifest: {e}")))?;
        (entry.name().to_string(), xml)
    };
    let rewritten = rewrite_manifest_xml(&manifest_xml, changeset_name, description)?;
    debug!("Rewrote {} for changeset {}", manifest_name, changeset_name);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for index in 0..archive.len() {
        if index == manifest_index {
            writer
                .start_file(manifest_name.as_str(), SimpleFileOptions::default())
                .map_err(rewrite_error)?;
            writer
                .write_all(rewritten.as_bytes())
                .map_err(|e| DeployError::ManifestRewriteError(e.to_string()))?;
        } else {
            let entry = archive.by_index_raw(index).map_err(rewrite_error)?;
            writer.raw_copy_file(entry).map_err(rewrite_error)?;
        }
    }

    let cursor = writer.finish().map_err(rewrite_error)?;
    Ok(cursor.into_inner())
}

fn rewrite_error(err: zip::result::ZipError) -> DeployError {
    DeployError::ManifestRewriteError(err.to_string())
}

/// Locate `package.xml` at the archive root or one folder deep (e.g. `unpackaged/package.xml`)
fn find_manifest<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>) -> Result<usize, DeployError> {
    let mut nested = None;
    for index in 0..archive.len() {
        let name = archive.by_index_raw(index).map_err(rewrite_error)?.name().to_string();
        if name == MANIFEST_FILE {
            return Ok(index);
        }
        let mut parts = name.split('/');
        if let (Some(_), Some(file), None) = (parts.next(), parts.next(), parts.next()) {
            if file == MANIFEST_FILE && nested.is_none() {
                nested = Some(index);
            }
        }
    }

    nested.ok_or_else(|| {
        DeployError::ManifestRewriteError("Package does not contain a package.xml".to_string())
    })
}

/// Replace the changeset header of a manifest.
///
/// Existing `fullName`, `name` and `description` elements that precede the first
/// `<types>` are dropped; member `<name>` elements inside `<types>` are untouched.
pub fn rewrite_manifest_xml(
    xml: &str,
    changeset_name: &str,
    description: Option<&str>,
) -> Result<String, DeployError> {
    let package_start = xml
        .find("<Package")
        .ok_or_else(|| DeployError::ManifestRewriteError("Manifest has no <Package> element".to_string()))?;
    let header_start = xml[package_start..]
        .find('>')
        .map(|offset| package_start + offset + 1)
        .ok_or_else(|| DeployError::ManifestRewriteError("Malformed <Package> element".to_string()))?;
    let body_start = ["<types>", "<version>", "</Package>"]
        .iter()
        .filter_map(|tag| xml[header_start..].find(tag))
        .min()
        .map(|offset| header_start + offset)
        .ok_or_else(|| DeployError::ManifestRewriteError("Manifest is not closed".to_string()))?;

    let mut header = String::from("\n");
    header.push_str(&format!("    <fullName>{}</fullName>\n", escape_xml(changeset_name)));
    header.push_str(&format!("    <name>{}</name>\n", escape_xml(changeset_name)));
    if let Some(description) = description.filter(|d| !d.trim().is_empty()) {
        header.push_str(&format!("    <description>{}</description>\n", escape_xml(description)));
    }
    header.push_str("    ");

    let mut out = String::with_capacity(xml.len() + header.len());
    out.push_str(&xml[..header_start]);
    out.push_str(&header);
    out.push_str(&xml[body_start..]);
    Ok(out)
}

/// Escape text for use inside an XML element
pub fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
