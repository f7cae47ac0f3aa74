//! Private key resolution
//!
//! Precedence, first non-empty wins:
//!
//! 1. the key given directly (`WG_PRIVATE_KEY`)
//! 2. the trimmed contents of the key file (`WG_PRIVATE_KEY_FILE`)
//! 3. `PrivateKey` in the `[Interface]` section
//!
//! An unreadable key file is a warning, not an error. A key that is present
//! but does not decode is an error at decode time; no lower source is tried.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use zeroize::Zeroizing;

/// Where the winning key came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    Environment,
    File(PathBuf),
    Document,
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Environment => write!(f, "WG_PRIVATE_KEY"),
            KeySource::File(path) => write!(f, "WG_PRIVATE_KEY_FILE {}", path.display()),
            KeySource::Document => write!(f, "Interface.PrivateKey"),
        }
    }
}

/// A still-encoded private key and its origin
pub struct ResolvedKey {
    pub source: KeySource,
    pub encoded: Zeroizing<String>,
}

impl fmt::Debug for ResolvedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedKey")
            .field("source", &self.source)
            .field("encoded", &"<redacted>")
            .finish()
    }
}

/// Pick the private key from the three sources.
///
/// Returns `None` when every source is absent or empty.
pub fn resolve_private_key(
    direct: Option<&str>,
    key_file: Option<&Path>,
    document: Option<&str>,
) -> Option<ResolvedKey> {
    if let Some(value) = direct.filter(|v| !v.is_empty()) {
        log::debug!("Using private key from WG_PRIVATE_KEY");
        return Some(ResolvedKey {
            source: KeySource::Environment,
            encoded: Zeroizing::new(value.to_string()),
        });
    }

    if let Some(path) = key_file.filter(|p| !p.as_os_str().is_empty()) {
        match fs::read_to_string(path) {
            Ok(content) => {
                let content = Zeroizing::new(content);
                let trimmed = content.trim();
                if !trimmed.is_empty() {
                    log::debug!("Using private key from {:?}", path);
                    return Some(ResolvedKey {
                        source: KeySource::File(path.to_path_buf()),
                        encoded: Zeroizing::new(trimmed.to_string()),
                    });
                }
                log::warn!("Key file {:?} is empty, falling back to config document", path);
            }
            Err(e) => {
                log::warn!("Could not read key file {:?}: {}", path, e);
            }
        }
    }

    document.map(str::trim).filter(|v| !v.is_empty()).map(|value| ResolvedKey {
        source: KeySource::Document,
        encoded: Zeroizing::new(value.to_string()),
    })
}
