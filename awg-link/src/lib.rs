//! Interface state application for AmneziaWG tunnels
//!
//! Once the engine has accepted its configuration, the tunnel interface still
//! needs its MTU, addresses and administrative state set. This crate does that
//! in a fixed order with fail-fast semantics:
//!
//! 1. set the MTU
//! 2. add each address, in source order
//! 3. bring the link up
//!
//! The link only becomes reachable after every address is attached; a failure
//! at any step leaves it administratively down.
//!
//! # Platform Requirements
//!
//! ## Linux
//! - Root privileges or `CAP_NET_ADMIN` capability
//! - Changes go through an `AF_NETLINK`/`NETLINK_ROUTE` socket, no helper
//!   processes are spawned
//!
//! ## Other platforms
//! [`NetlinkLink::open`] returns [`Error::NotSupported`]; [`apply`] itself is
//! platform independent and works with any [`LinkOps`] implementation.
//!
//! # Example
//!
//! ```ignore
//! use awg_link::{apply, NetlinkLink};
//!
//! let mut link = NetlinkLink::open("wg0")?;
//! apply(&mut link, &["10.8.0.2/24".to_string()], 1420)?;
//! ```

mod apply;
pub mod error;

#[cfg(target_os = "linux")]
mod netlink;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(not(target_os = "linux"))]
mod stub;

pub use apply::{apply, parse_cidr, LinkOps};
pub use error::{Error, Result};

#[cfg(target_os = "linux")]
pub use linux::NetlinkLink;

#[cfg(not(target_os = "linux"))]
pub use stub::NetlinkLink;
