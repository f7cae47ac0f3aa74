//! Stub interface handle for non-Linux platforms.
//!
//! Opening a link always fails with `Error::NotSupported`.

use ipnet::IpNet;

use crate::apply::LinkOps;
use crate::error::{Error, Result};

/// Interface handle placeholder (stub for non-Linux)
pub struct NetlinkLink {
    name: String,
}

impl NetlinkLink {
    /// Always fails: rtnetlink is Linux only
    pub fn open(name: &str) -> Result<Self> {
        Err(Error::NotSupported(format!(
            "cannot configure {}: interface configuration requires Linux rtnetlink",
            name
        )))
    }
}

impl LinkOps for NetlinkLink {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_mtu(&mut self, _mtu: u16) -> Result<()> {
        Err(Error::NotSupported("set MTU".into()))
    }

    fn add_address(&mut self, _address: &IpNet) -> Result<()> {
        Err(Error::NotSupported("add address".into()))
    }

    fn set_up(&mut self) -> Result<()> {
        Err(Error::NotSupported("set link up".into()))
    }
}
