//! Resolved interface and peer configuration

use crate::key::Key;
use crate::obfuscation::ObfuscationParams;
use crate::{DEFAULT_LISTEN_PORT, DEFAULT_MTU};

/// Interface-scope configuration, fully resolved and decoded
#[derive(Debug, Clone)]
pub struct InterfaceConfig {
    /// Interface private key
    pub private_key: Key,
    /// UDP listen port (always sent)
    pub listen_port: u16,
    /// Firewall mark, 0 = unset
    pub fwmark: u32,
    /// Interface addresses in CIDR notation, source order
    pub addresses: Vec<String>,
    /// Interface MTU
    pub mtu: u16,
    /// Obfuscation parameters
    pub obfuscation: ObfuscationParams,
}

impl InterfaceConfig {
    /// Create an interface configuration with default port and MTU
    pub fn new(private_key: Key) -> Self {
        Self {
            private_key,
            listen_port: DEFAULT_LISTEN_PORT,
            fwmark: 0,
            addresses: Vec::new(),
            mtu: DEFAULT_MTU,
            obfuscation: ObfuscationParams::default(),
        }
    }

    /// Set the listen port
    pub fn with_listen_port(mut self, port: u16) -> Self {
        self.listen_port = port;
        self
    }

    /// Set the firewall mark
    pub fn with_fwmark(mut self, fwmark: u32) -> Self {
        self.fwmark = fwmark;
        self
    }

    /// Set the interface addresses
    pub fn with_addresses(mut self, addresses: Vec<String>) -> Self {
        self.addresses = addresses;
        self
    }

    /// Set the MTU
    pub fn with_mtu(mut self, mtu: u16) -> Self {
        self.mtu = mtu;
        self
    }

    /// Set the obfuscation parameters
    pub fn with_obfuscation(mut self, obfuscation: ObfuscationParams) -> Self {
        self.obfuscation = obfuscation;
        self
    }
}

/// A single `[Peer]` entry
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// Peer public key
    pub public_key: Key,
    /// Optional preshared key
    pub preshared_key: Option<Key>,
    /// Optional `host:port` endpoint, passed through verbatim
    pub endpoint: Option<String>,
    /// Persistent keepalive interval in seconds, 0 = disabled
    pub persistent_keepalive: u16,
    /// Allowed IPs in CIDR notation, source order
    pub allowed_ips: Vec<String>,
}

impl PeerConfig {
    /// Create a peer with only a public key
    pub fn new(public_key: Key) -> Self {
        Self {
            public_key,
            preshared_key: None,
            endpoint: None,
            persistent_keepalive: 0,
            allowed_ips: Vec::new(),
        }
    }

    /// Set the preshared key
    pub fn with_preshared_key(mut self, key: Key) -> Self {
        self.preshared_key = Some(key);
        self
    }

    /// Set the endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the persistent keepalive interval
    pub fn with_persistent_keepalive(mut self, seconds: u16) -> Self {
        self.persistent_keepalive = seconds;
        self
    }

    /// Set the allowed IPs
    pub fn with_allowed_ips(mut self, ips: Vec<String>) -> Self {
        self.allowed_ips = ips;
        self
    }
}
