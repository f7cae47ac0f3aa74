//! Control-protocol stream rendering
//!
//! The engine parses the stream as one ordered transaction, so field order is
//! fixed: interface keys, obfuscation keys (jc, jmin, jmax, s1, s2, h1..h4),
//! then each peer in source order. Unset fields are never written; an
//! explicit zero would override the engine default (e.g. for `fwmark`).

use std::fmt::{self, Display, Write};

use zeroize::Zeroizing;

use crate::config::{InterfaceConfig, PeerConfig};

/// Rendered `key=value\n` lines, ready to hand to the engine.
///
/// The text contains key material in hex and is wiped on drop.
#[derive(Clone)]
pub struct ControlStream {
    text: Zeroizing<String>,
    lines: usize,
}

impl ControlStream {
    /// Full stream text
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Number of lines
    pub fn line_count(&self) -> usize {
        self.lines
    }

    /// Keys in emission order, without values
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.text
            .lines()
            .map(|line| line.split_once('=').map_or(line, |(key, _)| key))
    }
}

impl fmt::Debug for ControlStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlStream")
            .field("lines", &self.lines)
            .field("keys", &self.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Default)]
struct StreamWriter {
    text: Zeroizing<String>,
    lines: usize,
}

impl StreamWriter {
    fn line(&mut self, key: &str, value: impl Display) {
        // Writing into a String cannot fail
        let _ = writeln!(self.text, "{}={}", key, value);
        self.lines += 1;
    }

    fn nonzero(&mut self, key: &str, value: u32) {
        if value != 0 {
            self.line(key, value);
        }
    }

    fn nonempty(&mut self, key: &str, value: &str) {
        if !value.is_empty() {
            self.line(key, value);
        }
    }

    fn finish(self) -> ControlStream {
        ControlStream {
            text: self.text,
            lines: self.lines,
        }
    }
}

/// Render interface and peer configuration into a control stream
pub fn build(interface: &InterfaceConfig, peers: &[PeerConfig]) -> ControlStream {
    let mut w = StreamWriter::default();

    w.line("private_key", interface.private_key.to_hex().as_str());
    w.line("listen_port", interface.listen_port);
    w.nonzero("fwmark", interface.fwmark);

    let obf = &interface.obfuscation;
    w.nonzero("jc", obf.jc);
    w.nonzero("jmin", obf.jmin);
    w.nonzero("jmax", obf.jmax);
    w.nonzero("s1", obf.s1);
    w.nonzero("s2", obf.s2);
    w.nonempty("h1", &obf.h1);
    w.nonempty("h2", &obf.h2);
    w.nonempty("h3", &obf.h3);
    w.nonempty("h4", &obf.h4);

    for peer in peers {
        w.line("public_key", peer.public_key.to_hex().as_str());
        if let Some(ref psk) = peer.preshared_key {
            w.line("preshared_key", psk.to_hex().as_str());
        }
        if let Some(ref endpoint) = peer.endpoint {
            w.nonempty("endpoint", endpoint);
        }
        w.nonzero(
            "persistent_keepalive_interval",
            u32::from(peer.persistent_keepalive),
        );
        for ip in &peer.allowed_ips {
            w.nonempty("allowed_ip", ip.trim());
        }
    }

    w.finish()
}
