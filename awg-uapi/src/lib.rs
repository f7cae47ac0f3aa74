//! AmneziaWG control-protocol model
//!
//! Typed interface/peer configuration and a deterministic renderer for the
//! line-oriented `key=value` stream consumed by a running AmneziaWG engine.
//! Nothing in this crate performs I/O.
//!
//! ```rust
//! use awg_uapi::{build, InterfaceConfig, Key};
//!
//! let private_key =
//!     Key::from_base64("PrivateKey", "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=").unwrap();
//! let interface = InterfaceConfig::new(private_key);
//! let stream = build(&interface, &[]);
//!
//! assert!(stream.as_str().starts_with("private_key="));
//! assert!(stream.as_str().contains("listen_port=51820\n"));
//! ```

mod config;
mod error;
mod key;
mod obfuscation;
pub mod protocol;
mod stream;

pub use config::{InterfaceConfig, PeerConfig};
pub use error::{Error, Result};
pub use key::{Key, KEY_LEN};
pub use obfuscation::ObfuscationParams;
pub use stream::{build, ControlStream};

/// Default UDP listen port
pub const DEFAULT_LISTEN_PORT: u16 = 51820;

/// Default interface MTU
pub const DEFAULT_MTU: u16 = 1420;
