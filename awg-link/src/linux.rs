//! Linux interface handle backed by rtnetlink
//!
//! The handle resolves the interface index once, keeps one `NETLINK_ROUTE`
//! socket open for its lifetime and closes it on drop.

use std::ffi::CString;
use std::io;

use ipnet::IpNet;

use crate::apply::LinkOps;
use crate::error::{Error, Result};
use crate::netlink::{
    MsgBuffer, NetlinkSocket, IFA_ADDRESS, IFA_BROADCAST, IFA_LOCAL, IFLA_MTU, NLM_F_ACK,
    NLM_F_CREATE, NLM_F_EXCL, NLM_F_REQUEST, RTM_NEWADDR, RTM_NEWLINK, RTM_SETLINK,
};

/// Get the interface index for a given interface name
pub fn get_interface_index(name: &str) -> Result<u32> {
    let c_name = CString::new(name).map_err(|_| Error::DeviceNotFound(name.to_string()))?;

    // SAFETY: if_nametoindex is safe to call with a valid C string
    let index = unsafe { libc::if_nametoindex(c_name.as_ptr()) };

    if index == 0 {
        return Err(Error::DeviceNotFound(name.to_string()));
    }

    Ok(index)
}

/// An existing network interface, configured through rtnetlink
pub struct NetlinkLink {
    name: String,
    index: u32,
    socket: NetlinkSocket,
    seq: u32,
}

impl NetlinkLink {
    /// Look up an interface by name and open a netlink socket for it
    pub fn open(name: &str) -> Result<Self> {
        let index = get_interface_index(name)?;
        let socket = NetlinkSocket::new()?;

        log::debug!("Opened link {} (index {})", name, index);

        Ok(Self {
            name: name.to_string(),
            index,
            socket,
            seq: 0,
        })
    }

    /// Kernel interface index
    pub fn index(&self) -> u32 {
        self.index
    }

    fn next_seq(&mut self) -> u32 {
        self.seq = self.seq.wrapping_add(1);
        self.seq
    }
}

impl LinkOps for NetlinkLink {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_mtu(&mut self, mtu: u16) -> Result<()> {
        let seq = self.next_seq();
        let msg = mtu_message(self.index, mtu, seq);
        self.socket
            .request(&msg)
            .map_err(|source| Error::SetMtu { mtu, source })
    }

    fn add_address(&mut self, address: &IpNet) -> Result<()> {
        let seq = self.next_seq();
        let msg = address_message(self.index, address, seq);
        self.socket
            .request(&msg)
            .map_err(|source| Error::AddAddress {
                address: address.to_string(),
                source,
            })
    }

    fn set_up(&mut self) -> Result<()> {
        let seq = self.next_seq();
        let msg = up_message(self.index, seq);
        self.socket.request(&msg).map_err(Error::LinkUp)
    }
}

impl Drop for NetlinkLink {
    fn drop(&mut self) {
        log::debug!("Released link {}", self.name);
    }
}

fn mtu_message(index: u32, mtu: u16, seq: u32) -> Vec<u8> {
    let mut buf = MsgBuffer::new(RTM_SETLINK, NLM_F_REQUEST | NLM_F_ACK, seq);
    buf.put_ifinfomsg(index, 0, 0);
    buf.put_attr_u32(IFLA_MTU, u32::from(mtu));
    buf.finish()
}

fn up_message(index: u32, seq: u32) -> Vec<u8> {
    let up = libc::IFF_UP as u32;
    let mut buf = MsgBuffer::new(RTM_NEWLINK, NLM_F_REQUEST | NLM_F_ACK, seq);
    buf.put_ifinfomsg(index, up, up);
    buf.finish()
}

fn address_message(index: u32, address: &IpNet, seq: u32) -> Vec<u8> {
    let flags = NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL;
    let mut buf = MsgBuffer::new(RTM_NEWADDR, flags, seq);

    match address {
        IpNet::V4(net) => {
            buf.put_ifaddrmsg(libc::AF_INET as u8, net.prefix_len(), index);
            let octets = net.addr().octets();
            buf.put_attr_bytes(IFA_LOCAL, &octets);
            buf.put_attr_bytes(IFA_ADDRESS, &octets);
            // Same rule as iproute2: /31 and /32 have no broadcast address
            if net.prefix_len() < 31 {
                buf.put_attr_bytes(IFA_BROADCAST, &net.broadcast().octets());
            }
        }
        IpNet::V6(net) => {
            buf.put_ifaddrmsg(libc::AF_INET6 as u8, net.prefix_len(), index);
            let octets = net.addr().octets();
            buf.put_attr_bytes(IFA_LOCAL, &octets);
            buf.put_attr_bytes(IFA_ADDRESS, &octets);
        }
    }

    buf.finish()
}

/// Read the current MTU of an interface from /sys/class/net
pub fn read_mtu(name: &str) -> Result<u16> {
    let path = format!("/sys/class/net/{}/mtu", name);
    let text = std::fs::read_to_string(&path)?;
    text.trim()
        .parse()
        .map_err(|_| Error::Io(io::Error::new(io::ErrorKind::InvalidData, path)))
}
