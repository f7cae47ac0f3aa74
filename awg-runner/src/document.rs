//! INI configuration document
//!
//! The document has one `[Interface]` section and any number of `[Peer]`
//! sections, kept in source order. A `#` or `;` starts a comment anywhere on
//! a line. Values are trimmed and empty values are treated as absent.

use std::fmt::Display;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::{Ini, ParseOption, Properties};

use crate::error::ConfigError;

/// Permission bits that must be clear on the document (group and other)
pub const FORBIDDEN_MODE_BITS: u32 = 0o077;

/// Reject a document readable or writable by anyone but its owner.
///
/// Runs before the file is opened for reading.
pub fn check_permissions(path: &Path) -> Result<(), ConfigError> {
    let metadata = fs::metadata(path).map_err(|source| ConfigError::Stat {
        path: path.to_path_buf(),
        source,
    })?;

    let mode = metadata.permissions().mode() & 0o777;
    if mode & FORBIDDEN_MODE_BITS != 0 {
        return Err(ConfigError::InsecurePermissions {
            path: path.to_path_buf(),
            mode,
        });
    }
    Ok(())
}

/// A parsed configuration document
pub struct Document {
    ini: Ini,
    path: Option<PathBuf>,
}

impl Document {
    /// Check permissions, then read and parse the document at `path`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        check_permissions(path)?;

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut doc = Self::parse(&content)?;
        doc.path = Some(path.to_path_buf());
        log::debug!("Loaded config document {:?} ({} peers)", path, doc.peers().count());
        Ok(doc)
    }

    /// Parse document text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let options = ParseOption {
            enabled_escape: false,
            ..Default::default()
        };
        let ini = Ini::load_from_str_opt(content, options)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        for (name, _) in ini.iter() {
            if let Some(name) = name {
                if name != "Interface" && name != "Peer" {
                    log::debug!("Ignoring unknown section [{}]", name);
                }
            }
        }

        Ok(Self { ini, path: None })
    }

    /// Path the document was loaded from
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The `[Interface]` section
    pub fn interface(&self) -> Result<Section<'_>, ConfigError> {
        self.ini
            .section(Some("Interface"))
            .map(|props| Section {
                label: "Interface".to_string(),
                props,
            })
            .ok_or(ConfigError::MissingSection("Interface"))
    }

    /// All `[Peer]` sections in source order
    pub fn peers(&self) -> impl Iterator<Item = Section<'_>> {
        self.ini
            .section_all(Some("Peer"))
            .enumerate()
            .map(|(index, props)| Section {
                label: format!("Peer[{}]", index),
                props,
            })
    }
}

/// One section of the document with typed accessors
pub struct Section<'a> {
    label: String,
    props: &'a Properties,
}

impl<'a> Section<'a> {
    /// Section label used in error messages (`Interface`, `Peer[2]`)
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Qualified key name for error messages
    pub fn key_name(&self, key: &str) -> String {
        format!("{}.{}", self.label, key)
    }

    /// Trimmed value, `None` when absent or empty
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.props
            .get(key)
            .map(strip_comment)
            .filter(|value| !value.is_empty())
    }

    /// Parse a numeric value, `default` when absent or empty
    pub fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                key: self.key_name(key),
                value: value.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Comma-separated list; entries are trimmed and empty entries dropped.
    /// A key repeated within the section appends to the list.
    pub fn list(&self, key: &str) -> Vec<String> {
        self.props
            .get_all(key)
            .flat_map(|value| strip_comment(value).split(','))
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(String::from)
            .collect()
    }
}

/// Cut a trailing `# ...` or `; ...` comment and trim what is left
fn strip_comment(value: &str) -> &str {
    match value.find(['#', ';']) {
        Some(pos) => value[..pos].trim(),
        None => value.trim(),
    }
}
