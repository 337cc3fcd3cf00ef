use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::core::types::NormalizedHost;

/// Address family a [`BlockRule`] applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
    Hostname,
}

/// Why a rule exists; reported in logs when a host is refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockCategory {
    Loopback,
    Private,
    LinkLocal,
    ThisNetwork,
    CarrierGradeNat,
    IetfProtocol,
    Documentation,
    Benchmark,
    Unspecified,
    UniqueLocal,
    Ipv4Translated,
    Nat64,
    Discard,
    Teredo,
    LocalName,
    ClusterInternal,
    CloudMetadata,
}

impl fmt::Display for BlockCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Loopback => "loopback",
            Self::Private => "private",
            Self::LinkLocal => "link-local",
            Self::ThisNetwork => "this-network",
            Self::CarrierGradeNat => "carrier-grade-nat",
            Self::IetfProtocol => "ietf-protocol",
            Self::Documentation => "documentation",
            Self::Benchmark => "benchmark",
            Self::Unspecified => "unspecified",
            Self::UniqueLocal => "unique-local",
            Self::Ipv4Translated => "ipv4-translated",
            Self::Nat64 => "nat64",
            Self::Discard => "discard",
            Self::Teredo => "teredo",
            Self::LocalName => "local-name",
            Self::ClusterInternal => "cluster-internal",
            Self::CloudMetadata => "cloud-metadata",
        };
        f.write_str(name)
    }
}

/// Network prefix in CIDR notation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cidr {
    network: IpAddr,
    prefix: u8,
}

impl Cidr {
    pub const fn v4(a: u8, b: u8, c: u8, d: u8, prefix: u8) -> Self {
        Self {
            network: IpAddr::V4(Ipv4Addr::new(a, b, c, d)),
            prefix,
        }
    }

    pub const fn v6(segments: [u16; 8], prefix: u8) -> Self {
        let [a, b, c, d, e, f, g, h] = segments;
        Self {
            network: IpAddr::V6(Ipv6Addr::new(a, b, c, d, e, f, g, h)),
            prefix,
        }
    }

    /// Whether `ip` falls inside this prefix. Addresses of the other family
    /// never match.
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(addr)) => {
                let mask = u32::MAX.checked_shl(32 - u32::from(self.prefix)).unwrap_or(0);
                u32::from(net) & mask == u32::from(addr) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(addr)) => {
                let mask = u128::MAX.checked_shl(128 - u32::from(self.prefix)).unwrap_or(0);
                u128::from(net) & mask == u128::from(addr) & mask
            }
            _ => false,
        }
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

/// What a rule matches against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPattern {
    Cidr(Cidr),
    Exact(&'static str),
    Prefix(&'static str),
    Suffix(&'static str),
}

/// One entry of the blocklist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRule {
    pub family: AddressFamily,
    pub pattern: HostPattern,
    pub category: BlockCategory,
}

impl BlockRule {
    const fn new(family: AddressFamily, pattern: HostPattern, category: BlockCategory) -> Self {
        Self {
            family,
            pattern,
            category,
        }
    }

    fn matches(&self, subject: &Subject<'_>) -> bool {
        match (self.family, self.pattern) {
            (AddressFamily::Ipv4 | AddressFamily::Ipv6, HostPattern::Cidr(cidr)) => {
                subject.ip.is_some_and(|ip| cidr.contains(ip))
            }
            (_, HostPattern::Cidr(_)) => false,
            (_, HostPattern::Exact(name)) => subject.name == name,
            (_, HostPattern::Prefix(prefix)) => subject.name.starts_with(prefix),
            (_, HostPattern::Suffix(suffix)) => subject.name.ends_with(suffix),
        }
    }
}

use AddressFamily::{Hostname, Ipv4, Ipv6};
use BlockCategory::*;
use HostPattern::{Exact, Prefix, Suffix};

/// The static blocklist. A host is blocked iff any entry matches, so the
/// order of entries only decides which category gets reported.
pub const BLOCK_RULES: &[BlockRule] = &[
    // IPv4
    BlockRule::new(Ipv4, HostPattern::Cidr(Cidr::v4(127, 0, 0, 0, 8)), Loopback),
    BlockRule::new(Ipv4, HostPattern::Cidr(Cidr::v4(10, 0, 0, 0, 8)), Private),
    BlockRule::new(Ipv4, HostPattern::Cidr(Cidr::v4(172, 16, 0, 0, 12)), Private),
    BlockRule::new(Ipv4, HostPattern::Cidr(Cidr::v4(192, 168, 0, 0, 16)), Private),
    BlockRule::new(Ipv4, HostPattern::Cidr(Cidr::v4(169, 254, 0, 0, 16)), LinkLocal),
    BlockRule::new(Ipv4, HostPattern::Cidr(Cidr::v4(0, 0, 0, 0, 8)), ThisNetwork),
    BlockRule::new(Ipv4, HostPattern::Cidr(Cidr::v4(100, 64, 0, 0, 10)), CarrierGradeNat),
    BlockRule::new(Ipv4, HostPattern::Cidr(Cidr::v4(192, 0, 0, 0, 24)), IetfProtocol),
    BlockRule::new(Ipv4, HostPattern::Cidr(Cidr::v4(192, 0, 2, 0, 24)), Documentation),
    BlockRule::new(Ipv4, HostPattern::Cidr(Cidr::v4(198, 51, 100, 0, 24)), Documentation),
    BlockRule::new(Ipv4, HostPattern::Cidr(Cidr::v4(203, 0, 113, 0, 24)), Documentation),
    BlockRule::new(Ipv4, HostPattern::Cidr(Cidr::v4(198, 18, 0, 0, 15)), Benchmark),
    // IPv6
    BlockRule::new(Ipv6, HostPattern::Cidr(Cidr::v6([0, 0, 0, 0, 0, 0, 0, 1], 128)), Loopback),
    BlockRule::new(Ipv6, HostPattern::Cidr(Cidr::v6([0; 8], 128)), Unspecified),
    BlockRule::new(Ipv6, HostPattern::Cidr(Cidr::v6([0xfc00, 0, 0, 0, 0, 0, 0, 0], 7)), UniqueLocal),
    BlockRule::new(Ipv6, HostPattern::Cidr(Cidr::v6([0xfe80, 0, 0, 0, 0, 0, 0, 0], 10)), LinkLocal),
    BlockRule::new(Ipv6, HostPattern::Cidr(Cidr::v6([0, 0, 0, 0, 0xffff, 0, 0, 0], 96)), Ipv4Translated),
    BlockRule::new(Ipv6, HostPattern::Cidr(Cidr::v6([0x64, 0xff9b, 0, 0, 0, 0, 0, 0], 96)), Nat64),
    BlockRule::new(Ipv6, HostPattern::Cidr(Cidr::v6([0x100, 0, 0, 0, 0, 0, 0, 0], 64)), Discard),
    BlockRule::new(Ipv6, HostPattern::Cidr(Cidr::v6([0x2001, 0xdb8, 0, 0, 0, 0, 0, 0], 32)), Documentation),
    BlockRule::new(Ipv6, HostPattern::Cidr(Cidr::v6([0x2001, 0, 0, 0, 0, 0, 0, 0], 32)), Teredo),
    // Names
    BlockRule::new(Hostname, Exact("localhost"), Loopback),
    BlockRule::new(Hostname, Prefix("localhost."), Loopback),
    BlockRule::new(Hostname, Suffix(".localhost"), Loopback),
    BlockRule::new(Hostname, Suffix(".local"), LocalName),
    BlockRule::new(Hostname, Suffix(".internal"), LocalName),
    BlockRule::new(Hostname, Suffix(".intranet"), LocalName),
    BlockRule::new(Hostname, Suffix(".corp"), LocalName),
    BlockRule::new(Hostname, Suffix(".home"), LocalName),
    BlockRule::new(Hostname, Suffix(".lan"), LocalName),
    BlockRule::new(Hostname, Suffix(".localdomain"), LocalName),
    BlockRule::new(Hostname, Prefix("kubernetes.default"), ClusterInternal),
    BlockRule::new(Hostname, Suffix(".svc.cluster.local"), ClusterInternal),
    BlockRule::new(Hostname, Prefix("metadata."), CloudMetadata),
    BlockRule::new(Hostname, Exact("169.254.169.254"), CloudMetadata),
    BlockRule::new(Hostname, Exact("metadata.google.internal"), CloudMetadata),
];

struct Subject<'a> {
    name: &'a str,
    ip: Option<IpAddr>,
}

impl<'a> Subject<'a> {
    fn new(host: &'a str) -> Self {
        let name = host.strip_suffix('.').unwrap_or(host);
        let literal = if name.contains(':') {
            name.split('%').next().unwrap_or(name)
        } else {
            name
        };
        Self {
            name,
            ip: literal.parse::<IpAddr>().ok(),
        }
    }
}

/// Whether the host points at a private, reserved or metadata address.
pub fn is_blocked(host: &NormalizedHost) -> bool {
    matching_rule(host).is_some()
}

/// The rule that blocks `host`, if any.
///
/// An IPv4-mapped IPv6 address (`::ffff:a.b.c.d` in any textual form) is
/// judged by its embedded IPv4 address alone.
pub fn matching_rule(host: &NormalizedHost) -> Option<&'static BlockRule> {
    let subject = Subject::new(host.as_str());

    if let Some(IpAddr::V6(v6)) = subject.ip
        && let Some(v4) = v6.to_ipv4_mapped()
    {
        return matching_rule(&NormalizedHost::new(v4.to_string()));
    }

    BLOCK_RULES.iter().find(|rule| rule.matches(&subject))
}
