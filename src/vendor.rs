use crate::error::MuninnNetError;
use nom::bytes::complete::{take_till1, take_while_m_n};
use nom::character::complete::{char, space1};
use nom::combinator::map_res;
use nom::{IResult, Parser};
use pnet::util::MacAddr;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, trace};

/// Resolves the manufacturer of a network card from its MAC address.
pub trait VendorLookup {
    fn lookup(&self, mac: &MacAddr) -> Option<&str>;
}

/// Lookup that never knows a vendor, for running without an OUI table.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoVendors;

impl VendorLookup for NoVendors {
    fn lookup(&self, _mac: &MacAddr) -> Option<&str> {
        None
    }
}

/// OUI table keyed by the first three octets of a MAC address.
///
/// Built from lines such as `00:0C:29 VMware, Inc.`; the name ends at the
/// first comma. When a prefix is listed twice the first entry is kept.
#[derive(Debug, Default, Clone)]
pub struct VendorDb {
    vendors: HashMap<[u8; 3], String>,
}

impl VendorDb {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MuninnNetError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let db: VendorDb = content.parse()?;
        debug!("Loaded {} vendor prefixes from {}", db.len(), path.display());
        Ok(db)
    }

    pub fn insert(&mut self, prefix: [u8; 3], vendor: &str) {
        self.vendors
            .entry(prefix)
            .or_insert_with(|| vendor.to_string());
    }

    pub fn len(&self) -> usize {
        self.vendors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vendors.is_empty()
    }
}

impl VendorLookup for VendorDb {
    fn lookup(&self, mac: &MacAddr) -> Option<&str> {
        self.vendors
            .get(&[mac.0, mac.1, mac.2])
            .map(String::as_str)
    }
}

impl FromStr for VendorDb {
    type Err = MuninnNetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut db = VendorDb::default();
        for line in s.lines() {
            match parse_vendor_line(line) {
                Ok((_, (prefix, vendor))) => {
                    let vendor = vendor.trim_end();
                    if !vendor.is_empty() {
                        db.insert(prefix, vendor);
                    }
                }
                Err(_) => trace!("Skipping vendor line: {}", line),
            }
        }
        Ok(db)
    }
}

fn hex_octet(input: &str) -> IResult<&str, u8> {
    map_res(take_while_m_n(1, 2, |c: char| c.is_ascii_hexdigit()), |digits| {
        u8::from_str_radix(digits, 16)
    })
    .parse(input)
}

fn parse_vendor_line(input: &str) -> IResult<&str, ([u8; 3], &str)> {
    let (input, (a, _, b, _, c)) =
        (hex_octet, char(':'), hex_octet, char(':'), hex_octet).parse(input)?;
    let (input, _) = space1(input)?;
    let (input, vendor) = take_till1(|c: char| c == ',' || c == '\r' || c == '\n').parse(input)?;
    Ok((input, ([a, b, c], vendor)))
}
