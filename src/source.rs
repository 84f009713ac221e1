//! Schema Source
//!
//! Walks a directory of JSON Schema documents and turns it into the desired
//! registry state. Every check over the source tree runs before anything
//! touches the network:
//!
//! 1. every `*.json` file under the root is enumerated;
//! 2. logical names (file stem) are checked for duplicates across the whole
//!    tree, reporting every conflicting name with all of its paths;
//! 3. each file is parsed, its name checked against the message grammar, and
//!    its content compiled as a JSON Schema.
//!
//! Problems found in step 3 are accumulated over all files and raised together.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use jsonschema::JSONSchema;
use serde_json::Value;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::error::{DuplicateName, ErrorAccumulator, Result, SyncError};
use crate::naming;

const SCHEMA_EXTENSION: &str = ".json";

/// A validated schema document read from disk
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDocument {
    /// Logical name, the registry key (e.g. "app.widgets.created")
    pub name: String,
    /// Parsed schema content
    pub content: Value,
    /// File the document was read from
    pub source_path: PathBuf,
}

impl SchemaDocument {
    /// Canonical registry payload: compact JSON, not the file's original bytes
    pub fn payload(&self) -> Vec<u8> {
        // Serializing a `Value` cannot fail.
        serde_json::to_vec(&self.content).unwrap_or_default()
    }
}

/// The registry state the source tree asks for, keyed by logical name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesiredSet {
    documents: BTreeMap<String, SchemaDocument>,
}

impl DesiredSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, document: SchemaDocument) {
        self.documents.insert(document.name.clone(), document);
    }

    pub fn get(&self, name: &str) -> Option<&SchemaDocument> {
        self.documents.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.documents.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SchemaDocument> {
        self.documents.values()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl FromIterator<SchemaDocument> for DesiredSet {
    fn from_iter<I: IntoIterator<Item = SchemaDocument>>(iter: I) -> Self {
        let mut set = DesiredSet::new();
        for document in iter {
            set.insert(document);
        }
        set
    }
}

/// Load and validate every schema under `schemas_dir`
pub fn discover(schemas_dir: &Path) -> Result<DesiredSet> {
    info!("Loading schemas from '{}'", schemas_dir.display());

    let files = schema_files(schemas_dir)?;
    check_unique_names(&files)?;

    let mut problems = ErrorAccumulator::new();
    let mut desired = DesiredSet::new();

    for path in files {
        info!("Loading schema '{}'", path.display());
        if let Some(document) = load_document(&path, &mut problems) {
            desired.insert(document);
        }
    }

    problems.finish()?;
    debug!("{} schemas passed validation", desired.len());
    Ok(desired)
}

/// Logical name of a schema file: its file name with the `.json` suffix removed
pub fn logical_name(path: &Path) -> Option<String> {
    path.file_name()?
        .to_str()?
        .strip_suffix(SCHEMA_EXTENSION)
        .map(str::to_string)
}

/// Enumerate `**/*.json` under the root, sorted, skipping hidden entries.
///
/// Symlinks are followed, so a linked file or directory is part of the tree.
fn schema_files(schemas_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    let walker = WalkDir::new(schemas_dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().ends_with(SCHEMA_EXTENSION) {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

/// Fail with every duplicated logical name and all of its paths
fn check_unique_names(files: &[PathBuf]) -> Result<()> {
    let mut by_name: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for path in files {
        if let Some(name) = logical_name(path) {
            by_name.entry(name).or_default().push(path.clone());
        }
    }

    let duplicates: Vec<DuplicateName> = by_name
        .into_iter()
        .filter(|(_, paths)| paths.len() > 1)
        .map(|(name, paths)| DuplicateName { name, paths })
        .collect();

    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(SyncError::DuplicateNames(duplicates))
    }
}

/// Parse and validate one file, recording every problem in `problems`
fn load_document(path: &Path, problems: &mut ErrorAccumulator) -> Option<SchemaDocument> {
    // A name that is not UTF-8 cannot pass the grammar; report the path instead
    let name = logical_name(path).unwrap_or_else(|| path.display().to_string());

    let parsed = problems.check(read_json(path));
    let named = problems.check(naming::validate_message_name(&name));

    let content = parsed?;
    let compiled = problems.check(validate_schema(&name, &content));

    match (named, compiled) {
        (Some(()), Some(())) => Some(SchemaDocument {
            name,
            content,
            source_path: path.to_path_buf(),
        }),
        _ => None,
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let raw = fs::read(path)?;
    serde_json::from_slice(&raw).map_err(|source| SyncError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// A document is a valid schema if a validator can be compiled from it
pub fn validate_schema(name: &str, content: &Value) -> Result<()> {
    match JSONSchema::compile(content) {
        Ok(_) => Ok(()),
        Err(e) => Err(SyncError::InvalidSchema {
            name: name.to_string(),
            message: e.to_string(),
            document: serde_json::to_string_pretty(content).unwrap_or_default(),
        }),
    }
}
