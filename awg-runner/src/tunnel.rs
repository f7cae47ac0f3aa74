//! Resolution of a document into a validated tunnel configuration
//!
//! Every check that can fail on user input happens here, so a configuration
//! error is always reported before the engine is started or the interface is
//! touched.

use awg_uapi::{
    build, ControlStream, InterfaceConfig, Key, ObfuscationParams, PeerConfig,
    DEFAULT_LISTEN_PORT, DEFAULT_MTU,
};

use crate::credentials::resolve_private_key;
use crate::document::{Document, Section};
use crate::error::ConfigError;
use crate::settings::RunnerSettings;

/// Fully validated interface and peer configuration
#[derive(Debug, Clone)]
pub struct TunnelConfig {
    pub interface: InterfaceConfig,
    pub peers: Vec<PeerConfig>,
}

impl TunnelConfig {
    /// Resolve `doc` with the credentials from `settings`
    pub fn resolve(doc: &Document, settings: &RunnerSettings) -> Result<Self, ConfigError> {
        let iface = doc.interface()?;

        let resolved = resolve_private_key(
            settings.private_key(),
            settings.private_key_file(),
            iface.get("PrivateKey"),
        )
        .ok_or(ConfigError::MissingPrivateKey)?;
        let private_key = Key::from_base64(
            &format!("PrivateKey (from {})", resolved.source),
            &resolved.encoded,
        )?;

        let obfuscation = ObfuscationParams {
            jc: iface.parse_or("Jc", 0)?,
            jmin: iface.parse_or("Jmin", 0)?,
            jmax: iface.parse_or("Jmax", 0)?,
            s1: iface.parse_or("S1", 0)?,
            s2: iface.parse_or("S2", 0)?,
            h1: iface.get("H1").unwrap_or_default().to_string(),
            h2: iface.get("H2").unwrap_or_default().to_string(),
            h3: iface.get("H3").unwrap_or_default().to_string(),
            h4: iface.get("H4").unwrap_or_default().to_string(),
        };
        obfuscation.validate()?;

        let interface = InterfaceConfig::new(private_key)
            .with_listen_port(iface.parse_or("ListenPort", DEFAULT_LISTEN_PORT)?)
            .with_fwmark(parse_fwmark(&iface)?)
            .with_addresses(cidr_list(&iface, "Address")?)
            .with_mtu(iface.parse_or("MTU", DEFAULT_MTU)?)
            .with_obfuscation(obfuscation);

        let peers = doc
            .peers()
            .map(|section| resolve_peer(&section))
            .collect::<Result<Vec<_>, _>>()?;

        log::info!(
            "Resolved {} with {} address(es) and {} peer(s), key from {}",
            settings.interface,
            interface.addresses.len(),
            peers.len(),
            resolved.source
        );

        Ok(Self { interface, peers })
    }

    /// Render the control stream for this configuration
    pub fn control_stream(&self) -> ControlStream {
        build(&self.interface, &self.peers)
    }
}

fn resolve_peer(section: &Section<'_>) -> Result<PeerConfig, ConfigError> {
    let public_key = section
        .get("PublicKey")
        .ok_or_else(|| ConfigError::MissingPublicKey {
            section: section.label().to_string(),
        })?;
    let mut peer = PeerConfig::new(Key::from_base64(&section.key_name("PublicKey"), public_key)?)
        .with_persistent_keepalive(parse_keepalive(section)?)
        .with_allowed_ips(cidr_list(section, "AllowedIPs")?);

    if let Some(psk) = section.get("PresharedKey") {
        peer = peer.with_preshared_key(Key::from_base64(&section.key_name("PresharedKey"), psk)?);
    }
    if let Some(endpoint) = section.get("Endpoint") {
        peer = peer.with_endpoint(endpoint);
    }
    Ok(peer)
}

/// Comma list whose entries must all be CIDR prefixes
fn cidr_list(section: &Section<'_>, key: &str) -> Result<Vec<String>, ConfigError> {
    let entries = section.list(key);
    for entry in &entries {
        awg_link::parse_cidr(entry).map_err(|_| ConfigError::InvalidAddress {
            key: section.key_name(key),
            value: entry.clone(),
        })?;
    }
    Ok(entries)
}

/// `PersistentKeepalive` in seconds; `off` disables it
fn parse_keepalive(section: &Section<'_>) -> Result<u16, ConfigError> {
    match section.get("PersistentKeepalive") {
        Some(value) if value.eq_ignore_ascii_case("off") => Ok(0),
        _ => section.parse_or("PersistentKeepalive", 0),
    }
}

/// `FwMark` accepts decimal, `0x` hex or `off`
fn parse_fwmark(section: &Section<'_>) -> Result<u32, ConfigError> {
    let Some(value) = section.get("FwMark") else {
        return Ok(0);
    };
    if value.eq_ignore_ascii_case("off") {
        return Ok(0);
    }
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| ConfigError::InvalidValue {
        key: section.key_name("FwMark"),
        value: value.to_string(),
        reason: e.to_string(),
    })
}
