//! Minimal rtnetlink plumbing: socket, message builder, ack parsing.

use std::io;
use std::mem;
use std::os::unix::io::RawFd;
use std::time::Duration;

// Netlink constants
pub const NETLINK_ROUTE: i32 = 0;

// Netlink message header flags
pub const NLM_F_REQUEST: u16 = 0x01;
pub const NLM_F_ACK: u16 = 0x04;
pub const NLM_F_EXCL: u16 = 0x200;
pub const NLM_F_CREATE: u16 = 0x400;

// Netlink message types
pub const NLMSG_ERROR: u16 = 0x02;

// rtnetlink message types
pub const RTM_NEWLINK: u16 = 16;
pub const RTM_SETLINK: u16 = 19;
pub const RTM_NEWADDR: u16 = 20;

// Link attributes
pub const IFLA_MTU: u16 = 4;

// Address attributes
pub const IFA_ADDRESS: u16 = 1;
pub const IFA_LOCAL: u16 = 2;
pub const IFA_BROADCAST: u16 = 4;

pub const NLMSG_HDRLEN: usize = 16;
pub const IFINFOMSG_LEN: usize = 16;
pub const IFADDRMSG_LEN: usize = 8;
pub const NLATTR_HDRLEN: usize = 4;

pub const NLA_ALIGNTO: usize = 4;

#[inline]
pub fn nla_align(len: usize) -> usize {
    (len + NLA_ALIGNTO - 1) & !(NLA_ALIGNTO - 1)
}

/// A `NETLINK_ROUTE` socket bound to the kernel.
pub struct NetlinkSocket {
    fd: RawFd,
}

impl NetlinkSocket {
    pub fn new() -> io::Result<Self> {
        let fd = unsafe {
            libc::socket(
                libc::AF_NETLINK,
                libc::SOCK_RAW | libc::SOCK_CLOEXEC,
                NETLINK_ROUTE,
            )
        };

        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        let mut addr: libc::sockaddr_nl = unsafe { mem::zeroed() };
        addr.nl_family = libc::AF_NETLINK as u16;

        let ret = unsafe {
            libc::bind(
                fd,
                &addr as *const libc::sockaddr_nl as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_nl>() as u32,
            )
        };

        if ret < 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        Ok(Self { fd })
    }

    /// Send a request flagged `NLM_F_ACK` and wait for the kernel's answer.
    ///
    /// A zero error code is success; a negative one becomes the matching
    /// OS error.
    pub fn request(&self, msg: &[u8]) -> io::Result<()> {
        self.send(msg)?;

        let mut buf = [0u8; 1024];
        let len = self.recv_retrying(&mut buf)?;
        match parse_ack(&buf[..len]) {
            Some(0) => Ok(()),
            Some(code) => Err(io::Error::from_raw_os_error(-code)),
            None => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "unexpected netlink reply",
            )),
        }
    }

    fn send(&self, msg: &[u8]) -> io::Result<()> {
        let mut addr: libc::sockaddr_nl = unsafe { mem::zeroed() };
        addr.nl_family = libc::AF_NETLINK as u16;

        let sent = unsafe {
            libc::sendto(
                self.fd,
                msg.as_ptr() as *const libc::c_void,
                msg.len(),
                0,
                &addr as *const libc::sockaddr_nl as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_nl>() as u32,
            )
        };

        if sent < 0 {
            return Err(io::Error::last_os_error());
        }

        if sent as usize != msg.len() {
            return Err(io::Error::other("incomplete send"));
        }

        Ok(())
    }

    fn recv_retrying(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut retries = 3;
        loop {
            let received = unsafe {
                libc::recv(self.fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len(), 0)
            };

            if received < 0 {
                let err = io::Error::last_os_error();
                if retries > 0
                    && matches!(
                        err.raw_os_error(),
                        Some(libc::EAGAIN) | Some(libc::EINTR)
                    )
                {
                    retries -= 1;
                    std::thread::sleep(Duration::from_millis(10));
                    continue;
                }
                return Err(err);
            }

            return Ok(received as usize);
        }
    }
}

impl Drop for NetlinkSocket {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}

/// Buffer for building a single netlink message.
pub struct MsgBuffer {
    data: Vec<u8>,
}

impl MsgBuffer {
    /// Start a message with a header whose length is filled in by [`finish`].
    ///
    /// [`finish`]: MsgBuffer::finish
    pub fn new(msg_type: u16, flags: u16, seq: u32) -> Self {
        let mut buf = Self {
            data: Vec::with_capacity(128),
        };
        buf.put_u32(0);
        buf.put_u16(msg_type);
        buf.put_u16(flags);
        buf.put_u32(seq);
        buf.put_u32(0);
        buf
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn put_u8(&mut self, val: u8) {
        self.data.push(val);
    }

    pub fn put_u16(&mut self, val: u16) {
        self.data.extend_from_slice(&val.to_ne_bytes());
    }

    pub fn put_u32(&mut self, val: u32) {
        self.data.extend_from_slice(&val.to_ne_bytes());
    }

    pub fn align(&mut self) {
        let aligned = nla_align(self.data.len());
        self.data.resize(aligned, 0);
    }

    /// `struct ifinfomsg`
    pub fn put_ifinfomsg(&mut self, index: u32, flags: u32, change: u32) {
        let start = self.data.len();
        self.put_u8(libc::AF_UNSPEC as u8);
        self.put_u8(0);
        self.put_u16(0);
        self.put_u32(index);
        self.put_u32(flags);
        self.put_u32(change);
        debug_assert_eq!(self.data.len() - start, IFINFOMSG_LEN);
    }

    /// `struct ifaddrmsg`
    pub fn put_ifaddrmsg(&mut self, family: u8, prefix_len: u8, index: u32) {
        let start = self.data.len();
        self.put_u8(family);
        self.put_u8(prefix_len);
        self.put_u8(0); // flags
        self.put_u8(0); // RT_SCOPE_UNIVERSE
        self.put_u32(index);
        debug_assert_eq!(self.data.len() - start, IFADDRMSG_LEN);
    }

    pub fn put_attr_u32(&mut self, attr_type: u16, val: u32) {
        self.put_u16((NLATTR_HDRLEN + 4) as u16);
        self.put_u16(attr_type);
        self.put_u32(val);
        self.align();
    }

    pub fn put_attr_bytes(&mut self, attr_type: u16, val: &[u8]) {
        self.put_u16((NLATTR_HDRLEN + val.len()) as u16);
        self.put_u16(attr_type);
        self.put_bytes(val);
        self.align();
    }

    /// Write the total length into the header and return the bytes.
    pub fn finish(mut self) -> Vec<u8> {
        let len = self.data.len() as u32;
        self.data[0..4].copy_from_slice(&len.to_ne_bytes());
        self.data
    }
}

/// Extract the error code from an `NLMSG_ERROR` reply (0 means ack).
pub fn parse_ack(buf: &[u8]) -> Option<i32> {
    if buf.len() < NLMSG_HDRLEN + 4 {
        return None;
    }

    let msg_type = u16::from_ne_bytes([buf[4], buf[5]]);
    if msg_type != NLMSG_ERROR {
        return None;
    }

    Some(i32::from_ne_bytes([
        buf[NLMSG_HDRLEN],
        buf[NLMSG_HDRLEN + 1],
        buf[NLMSG_HDRLEN + 2],
        buf[NLMSG_HDRLEN + 3],
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_length_is_patched() {
        let mut buf = MsgBuffer::new(RTM_SETLINK, NLM_F_REQUEST | NLM_F_ACK, 7);
        buf.put_ifinfomsg(3, 0, 0);
        buf.put_attr_u32(IFLA_MTU, 1420);
        let msg = buf.finish();

        assert_eq!(msg.len(), NLMSG_HDRLEN + IFINFOMSG_LEN + 8);
        assert_eq!(u32::from_ne_bytes(msg[0..4].try_into().unwrap()) as usize, msg.len());
        assert_eq!(u16::from_ne_bytes([msg[4], msg[5]]), RTM_SETLINK);
        assert_eq!(u32::from_ne_bytes(msg[8..12].try_into().unwrap()), 7);
    }

    #[test]
    fn test_fixed_header_sizes() {
        let mut buf = MsgBuffer::new(RTM_NEWADDR, NLM_F_REQUEST, 2);
        buf.put_ifaddrmsg(libc::AF_INET as u8, 24, 5);
        assert_eq!(buf.finish().len(), NLMSG_HDRLEN + IFADDRMSG_LEN);

        let mut buf = MsgBuffer::new(RTM_NEWLINK, NLM_F_REQUEST, 3);
        buf.put_ifinfomsg(5, 1, 1);
        assert_eq!(buf.finish().len(), NLMSG_HDRLEN + IFINFOMSG_LEN);
    }

    #[test]
    fn test_attr_padding() {
        let mut buf = MsgBuffer::new(RTM_NEWADDR, NLM_F_REQUEST, 1);
        buf.put_attr_bytes(IFA_LOCAL, &[10, 0, 0]);
        let msg = buf.finish();
        // 4-byte attribute header + 3 bytes payload, padded to 8
        assert_eq!(msg.len(), NLMSG_HDRLEN + 8);
        assert_eq!(u16::from_ne_bytes([msg[16], msg[17]]), 7);
    }

    #[test]
    fn test_parse_ack() {
        let mut reply = vec![0u8; NLMSG_HDRLEN + 4];
        reply[4..6].copy_from_slice(&NLMSG_ERROR.to_ne_bytes());
        assert_eq!(parse_ack(&reply), Some(0));

        reply[16..20].copy_from_slice(&(-libc::EEXIST).to_ne_bytes());
        assert_eq!(parse_ack(&reply), Some(-libc::EEXIST));

        reply[4..6].copy_from_slice(&RTM_NEWLINK.to_ne_bytes());
        assert_eq!(parse_ack(&reply), None);
        assert_eq!(parse_ack(&reply[..8]), None);
    }
}
