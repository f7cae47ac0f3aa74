//! Ordered, fail-fast interface state application

use ipnet::IpNet;

use crate::error::{Error, Result};

/// Operations needed to bring a tunnel interface into service.
///
/// Implemented by [`crate::NetlinkLink`] for real interfaces; tests provide
/// recording doubles.
pub trait LinkOps {
    /// Interface name
    fn name(&self) -> &str;

    /// Set the link MTU
    fn set_mtu(&mut self, mtu: u16) -> Result<()>;

    /// Attach an address to the link
    fn add_address(&mut self, address: &IpNet) -> Result<()>;

    /// Set the link administratively up
    fn set_up(&mut self) -> Result<()>;
}

/// Parse an address in CIDR notation, trimming surrounding whitespace.
///
/// Host bits are kept (`10.0.0.2/24` stays `10.0.0.2/24`).
pub fn parse_cidr(address: &str) -> Result<IpNet> {
    let trimmed = address.trim();
    trimmed
        .parse::<IpNet>()
        .map_err(|e| Error::InvalidAddress(format!("{}: {}", trimmed, e)))
}

/// Set MTU, add addresses in order, then bring the link up.
///
/// Stops at the first failure; later steps are not attempted.
pub fn apply<L: LinkOps + ?Sized>(link: &mut L, addresses: &[String], mtu: u16) -> Result<()> {
    log::debug!("Setting MTU {} on {}", mtu, link.name());
    link.set_mtu(mtu)?;

    for address in addresses {
        let net = parse_cidr(address)?;
        log::info!("Adding address: {}", net);
        link.add_address(&net)?;
    }

    log::info!("Bringing interface {} up...", link.name());
    link.set_up()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[derive(Debug, PartialEq)]
    enum Call {
        Mtu(u16),
        Addr(String),
        Up,
    }

    #[derive(Default)]
    struct RecordingLink {
        calls: Vec<Call>,
        fail_mtu: bool,
        fail_addr: Option<String>,
    }

    impl LinkOps for RecordingLink {
        fn name(&self) -> &str {
            "test0"
        }

        fn set_mtu(&mut self, mtu: u16) -> Result<()> {
            self.calls.push(Call::Mtu(mtu));
            if self.fail_mtu {
                return Err(Error::SetMtu {
                    mtu,
                    source: io::Error::from_raw_os_error(1),
                });
            }
            Ok(())
        }

        fn add_address(&mut self, address: &IpNet) -> Result<()> {
            let text = address.to_string();
            self.calls.push(Call::Addr(text.clone()));
            if self.fail_addr.as_deref() == Some(text.as_str()) {
                return Err(Error::AddAddress {
                    address: text,
                    source: io::Error::from_raw_os_error(17),
                });
            }
            Ok(())
        }

        fn set_up(&mut self) -> Result<()> {
            self.calls.push(Call::Up);
            Ok(())
        }
    }

    fn addrs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_apply_order() {
        let mut link = RecordingLink::default();
        apply(&mut link, &addrs(&["10.8.0.2/24", " fd00::2/64 "]), 1420).unwrap();
        assert_eq!(
            link.calls,
            vec![
                Call::Mtu(1420),
                Call::Addr("10.8.0.2/24".into()),
                Call::Addr("fd00::2/64".into()),
                Call::Up,
            ]
        );
    }

    #[test]
    fn test_bad_cidr_stops_before_up() {
        let mut link = RecordingLink::default();
        let err = apply(&mut link, &addrs(&["10.0.0.2/24", "bad-cidr"]), 1420).unwrap_err();

        assert!(err.is_config_error());
        assert!(err.to_string().contains("bad-cidr"));
        assert_eq!(
            link.calls,
            vec![Call::Mtu(1420), Call::Addr("10.0.0.2/24".into())]
        );
    }

    #[test]
    fn test_mtu_failure_stops_everything() {
        let mut link = RecordingLink {
            fail_mtu: true,
            ..Default::default()
        };
        assert!(apply(&mut link, &addrs(&["10.0.0.2/24"]), 1280).is_err());
        assert_eq!(link.calls, vec![Call::Mtu(1280)]);
    }

    #[test]
    fn test_address_failure_stops_before_up() {
        let mut link = RecordingLink {
            fail_addr: Some("10.0.0.3/24".into()),
            ..Default::default()
        };
        let err = apply(
            &mut link,
            &addrs(&["10.0.0.2/24", "10.0.0.3/24", "10.0.0.4/24"]),
            1420,
        )
        .unwrap_err();

        assert!(matches!(err, Error::AddAddress { .. }));
        assert!(!link.calls.contains(&Call::Up));
        assert!(!link.calls.contains(&Call::Addr("10.0.0.4/24".into())));
    }

    #[test]
    fn test_no_addresses_still_brings_up() {
        let mut link = RecordingLink::default();
        apply(&mut link, &[], 1420).unwrap();
        assert_eq!(link.calls, vec![Call::Mtu(1420), Call::Up]);
    }

    #[test]
    fn test_parse_cidr() {
        assert_eq!(parse_cidr(" 10.0.0.2/24").unwrap().to_string(), "10.0.0.2/24");
        assert!(parse_cidr("10.0.0.2").is_err());
        assert!(parse_cidr("10.0.0.0/33").is_err());
    }
}
