use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const MAX_BGP_ASN: u64 = u32::MAX as u64;
const MAX_ASN: u64 = (1 << 48) - 1;
const ASN_GROUP_BITS: u32 = 16;

pub type InterfaceId = u64;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseIsdAsnError {
    #[error("malformed ISD-AS '{0}': expected <isd>-<as>")]
    MissingSeparator(String),
    #[error("malformed ISD in '{0}'")]
    InvalidIsd(String),
    #[error("malformed AS in '{0}'")]
    InvalidAsn(String),
}

/// Identifier of a network domain: an isolation domain plus an autonomous system.
///
/// The AS part is printed in decimal when it fits a BGP AS number and as three
/// colon-separated hex groups otherwise (`1-ff00:0:110`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IsdAsn {
    isd: u16,
    asn: u64,
}

impl IsdAsn {
    pub fn new(isd: u16, asn: u64) -> Result<Self, ParseIsdAsnError> {
        if asn > MAX_ASN {
            return Err(ParseIsdAsnError::InvalidAsn(format!("{isd}-{asn}")));
        }
        Ok(Self { isd, asn })
    }

    pub fn isd(&self) -> u16 {
        self.isd
    }

    pub fn asn(&self) -> u64 {
        self.asn
    }
}

impl fmt::Display for IsdAsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.asn <= MAX_BGP_ASN {
            return write!(f, "{}-{}", self.isd, self.asn);
        }
        let mask = (1u64 << ASN_GROUP_BITS) - 1;
        write!(
            f,
            "{}-{:x}:{:x}:{:x}",
            self.isd,
            (self.asn >> (2 * ASN_GROUP_BITS)) & mask,
            (self.asn >> ASN_GROUP_BITS) & mask,
            self.asn & mask
        )
    }
}

impl FromStr for IsdAsn {
    type Err = ParseIsdAsnError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (isd, asn) = raw
            .split_once('-')
            .ok_or_else(|| ParseIsdAsnError::MissingSeparator(raw.to_string()))?;

        if isd.is_empty() || !isd.chars().all(|c| c.is_ascii_digit()) {
            return Err(ParseIsdAsnError::InvalidIsd(raw.to_string()));
        }
        let isd: u16 = isd
            .parse()
            .map_err(|_| ParseIsdAsnError::InvalidIsd(raw.to_string()))?;

        let asn = if asn.contains(':') {
            parse_hex_asn(asn).ok_or_else(|| ParseIsdAsnError::InvalidAsn(raw.to_string()))?
        } else {
            if asn.is_empty() || !asn.chars().all(|c| c.is_ascii_digit()) {
                return Err(ParseIsdAsnError::InvalidAsn(raw.to_string()));
            }
            let value: u64 = asn
                .parse()
                .map_err(|_| ParseIsdAsnError::InvalidAsn(raw.to_string()))?;
            if value > MAX_BGP_ASN {
                return Err(ParseIsdAsnError::InvalidAsn(raw.to_string()));
            }
            value
        };

        Ok(Self { isd, asn })
    }
}

fn parse_hex_asn(raw: &str) -> Option<u64> {
    let groups: Vec<&str> = raw.split(':').collect();
    if groups.len() != 3 {
        return None;
    }
    groups.iter().try_fold(0u64, |acc, group| {
        if group.is_empty() || group.len() > 4 || !group.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let value = u64::from_str_radix(group, 16).ok()?;
        Some((acc << ASN_GROUP_BITS) | value)
    })
}

impl Serialize for IsdAsn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IsdAsn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One interface crossing on a candidate path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathInterface {
    pub node: IsdAsn,
    pub id: InterfaceId,
}

impl PathInterface {
    pub fn new(node: IsdAsn, id: InterfaceId) -> Self {
        Self { node, id }
    }
}

/// Directed edge `(as_a, if_a) -> (as_b, if_b)` exchanged with the policy engine.
///
/// Parallel links between the same pair of nodes differ by interface, so equality
/// covers all four fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub as_a: IsdAsn,
    pub if_a: InterfaceId,
    pub as_b: IsdAsn,
    pub if_b: InterfaceId,
}

impl Link {
    pub fn new(as_a: IsdAsn, if_a: InterfaceId, as_b: IsdAsn, if_b: InterfaceId) -> Self {
        Self {
            as_a,
            if_a,
            as_b,
            if_b,
        }
    }

    pub fn between(from: PathInterface, to: PathInterface) -> Self {
        Self::new(from.node, from.id, to.node, to.id)
    }

    pub fn origin(&self) -> Hop {
        Hop::new(self.as_a, self.if_a)
    }

    pub fn target(&self) -> Hop {
        Hop::new(self.as_b, self.if_b)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinates {
    pub latitude: f32,
    pub longitude: f32,
    #[serde(default)]
    pub address: Option<String>,
}

/// Raw route handed out by the topology oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePath {
    pub interfaces: Vec<PathInterface>,
    /// Earliest instant at which any hop of the path stops being valid.
    pub expiry: DateTime<Utc>,
    /// Per link (consecutive interface pair), in kbit/s.
    #[serde(default)]
    pub bandwidth_kbps: Vec<Option<u64>>,
    /// Per link (consecutive interface pair).
    #[serde(default)]
    pub latency: Vec<Option<Duration>>,
    /// Per interface.
    #[serde(default)]
    pub geo: Vec<Option<GeoCoordinates>>,
}

impl CandidatePath {
    pub fn new(interfaces: Vec<PathInterface>, expiry: DateTime<Utc>) -> Self {
        Self {
            interfaces,
            expiry,
            bandwidth_kbps: Vec::new(),
            latency: Vec::new(),
            geo: Vec::new(),
        }
    }

    /// Consecutive interface crossings projected to links.
    pub fn links(&self) -> Vec<Link> {
        self.interfaces
            .windows(2)
            .map(|pair| Link::between(pair[0], pair[1]))
            .collect()
    }
}

/// Minimum expiry across candidates, `None` for an empty set.
pub fn min_expiry(candidates: &[CandidatePath]) -> Option<DateTime<Utc>> {
    candidates.iter().map(|path| path.expiry).min()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hop {
    pub node: IsdAsn,
    pub interface: InterfaceId,
}

impl Hop {
    pub fn new(node: IsdAsn, interface: InterfaceId) -> Self {
        Self { node, interface }
    }
}

/// Policy-compliant route in order of visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPath {
    pub src: IsdAsn,
    pub dst: IsdAsn,
    pub hops: Vec<Hop>,
}

impl ResolvedPath {
    pub fn new(src: IsdAsn, dst: IsdAsn, hops: Vec<Hop>) -> Self {
        Self { src, dst, hops }
    }

    /// Hop predicate sequence, e.g. `1-ff00:0:110#0,1 1-ff00:0:111#41,0`.
    pub fn sequence(&self) -> String {
        let mut groups: Vec<(IsdAsn, Vec<InterfaceId>)> = Vec::new();
        for hop in &self.hops {
            match groups.last_mut() {
                Some((node, interfaces)) if *node == hop.node => interfaces.push(hop.interface),
                _ => groups.push((hop.node, vec![hop.interface])),
            }
        }

        let last = groups.len().saturating_sub(1);
        groups
            .iter()
            .enumerate()
            .map(|(idx, (node, interfaces))| {
                let (ingress, egress) = match interfaces.as_slice() {
                    [single] if idx == 0 => (0, *single),
                    [single] if idx == last => (*single, 0),
                    [single] => return format!("{node}#{single}"),
                    [first, .., last_if] => (*first, *last_if),
                    [] => (0, 0),
                };
                format!("{node}#{ingress},{egress}")
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}
