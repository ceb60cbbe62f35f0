//! Directory key construction and lookup-string classification.

use crate::types::{Device, DeviceKey};

/// Highest octet value accepted as an address lookup.
///
/// 255 is excluded so a broadcast-looking string never resolves as an IP.
const MAX_OCTET: i32 = 254;

/// How an `ip_or_name` argument is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKey<'a> {
    /// Four dot-separated integers in `0..=254`, resolved through the IP index
    Ip(&'a str),

    /// Anything else, resolved through the name index
    Name(&'a str),
}

/// Classify a lookup string. Address form always takes precedence over names.
pub fn classify_lookup_key(ip_or_name: &str) -> LookupKey<'_> {
    if is_lookup_address(ip_or_name) {
        LookupKey::Ip(ip_or_name)
    } else {
        LookupKey::Name(ip_or_name)
    }
}

fn is_lookup_address(s: &str) -> bool {
    let octets: Vec<&str> = s.split('.').collect();
    octets.len() == 4
        && octets.iter().all(|octet| {
            octet
                .parse::<i32>()
                .is_ok_and(|value| (0..=MAX_OCTET).contains(&value))
        })
}

/// Composite directory key: `name + "_" + mac`
pub fn build_key(device: &Device) -> DeviceKey {
    format!("{}_{}", device.name, device.mac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_quads_are_addresses() {
        assert_eq!(classify_lookup_key("192.168.1.5"), LookupKey::Ip("192.168.1.5"));
        assert_eq!(classify_lookup_key("0.0.0.0"), LookupKey::Ip("0.0.0.0"));
        assert_eq!(classify_lookup_key("10.0.0.254"), LookupKey::Ip("10.0.0.254"));
    }

    #[test]
    fn octet_255_falls_back_to_name() {
        assert_eq!(
            classify_lookup_key("192.168.1.255"),
            LookupKey::Name("192.168.1.255")
        );
    }

    #[test]
    fn malformed_addresses_are_names() {
        for s in ["lamp", "", "10.0.0", "10.0.0.1.2", "10.0.0.x", "10..0.1", "-1.0.0.1", "300.1.1.1"] {
            assert_eq!(classify_lookup_key(s), LookupKey::Name(s), "{s}");
        }
    }

    #[test]
    fn key_joins_name_and_mac() {
        let device = Device::new("lamp", "AA:BB", "10.0.0.2");
        assert_eq!(build_key(&device), "lamp_AA:BB");
    }
}
