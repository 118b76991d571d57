//! Parsing of OLT locators, serial numbers and VLAN lists

use anyhow::{anyhow, Result};
use regex::Regex;
use std::fmt;
use std::ops::RangeInclusive;
use std::sync::OnceLock;

/// Frame/Slot/Port locator of a PON port on the chassis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fsp {
    pub frame: u32,
    pub slot: u32,
    pub port: u32,
}

impl fmt::Display for Fsp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.frame, self.slot, self.port)
    }
}

/// Parse an "F/S/P" locator such as `0/1/7`
pub fn parse_fsp(s: &str) -> Result<Fsp> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^\s*(\d+)\s*/\s*(\d+)\s*/\s*(\d+)\s*$").expect("valid regex"));

    let caps = re
        .captures(s)
        .ok_or_else(|| anyhow!("invalid F/S/P locator '{}'", s))?;
    let num = |i: usize| -> Result<u32> {
        caps[i]
            .parse()
            .map_err(|_| anyhow!("F/S/P component out of range in '{}'", s))
    };

    Ok(Fsp {
        frame: num(1)?,
        slot: num(2)?,
        port: num(3)?,
    })
}

/// Normalize a raw serial number: trimmed, upper-case, no separators
pub fn normalize_serial(sn: &str) -> String {
    sn.trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Derive the human-friendly form of a 16-digit hex GPON serial
///
/// The first four bytes are the ASCII vendor code, so `48575443D7B00234`
/// becomes `HWTC-D7B00234`.
pub fn friendly_serial(sn: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^([0-9A-Fa-f]{8})([0-9A-Fa-f]{8})$").expect("valid regex"));

    let caps = re.captures(sn.trim())?;
    let vendor_hex = &caps[1];
    let vendor: String = (0..4)
        .map(|i| u8::from_str_radix(&vendor_hex[i * 2..i * 2 + 2], 16).ok())
        .collect::<Option<Vec<u8>>>()?
        .into_iter()
        .map(char::from)
        .collect();

    if !vendor.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    Some(format!("{}-{}", vendor, caps[2].to_ascii_uppercase()))
}

/// Parse a business VLAN list such as `100, 200-201`
///
/// Entries that are not a VLAN id (1..=4094) or a well-formed range are
/// skipped.
pub fn parse_vlan_list(s: &str) -> Vec<RangeInclusive<u16>> {
    fn vlan(v: &str) -> Option<u16> {
        v.trim().parse().ok().filter(|v| (1..=4094).contains(v))
    }

    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .filter_map(|item| match item.split_once('-') {
            Some((start, end)) => {
                let (start, end) = (vlan(start)?, vlan(end)?);
                (start <= end).then_some(start..=end)
            }
            None => vlan(item).map(|v| v..=v),
        })
        .collect()
}
