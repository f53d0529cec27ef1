//! Team Cymru IP-to-ASN TXT lookups.

use async_trait::async_trait;
use hickory_resolver::{TokioAsyncResolver, error::ResolveErrorKind};
use std::net::IpAddr;
use tracing::debug;

use super::AsnError;

const IPV4_ORIGIN_ZONE: &str = "origin.asn.cymru.com";
const IPV6_ORIGIN_ZONE: &str = "origin6.asn.cymru.com";

/// One parsed origin record: `ASN | CIDR | country | registry | allocated`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsnRecord {
    pub asn: String,
    pub network: String,
    pub country: String,
    pub registry: String,
    pub allocated: String,
}

/// Build the reversed query name for an IP address
///
/// IPv4 (including IPv4-mapped IPv6) reverses the four octets under
/// `origin.asn.cymru.com`; IPv6 reverses all 32 nibbles under
/// `origin6.asn.cymru.com`.
pub fn reverse_query_name(ip: &str) -> Result<String, AsnError> {
    let addr: IpAddr = ip
        .trim()
        .parse()
        .map_err(|_| AsnError::InvalidIp(ip.to_string()))?;

    let addr = match addr {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    };

    match addr {
        IpAddr::V4(v4) => {
            let [a, b, c, d] = v4.octets();
            Ok(format!("{d}.{c}.{b}.{a}.{IPV4_ORIGIN_ZONE}"))
        }
        IpAddr::V6(v6) => {
            let nibbles: Vec<String> = v6
                .octets()
                .iter()
                .rev()
                .flat_map(|byte| [byte & 0x0f, byte >> 4])
                .map(|nibble| format!("{nibble:x}"))
                .collect();
            Ok(format!("{}.{IPV6_ORIGIN_ZONE}", nibbles.join(".")))
        }
    }
}

/// Parse a single origin TXT answer
pub fn parse_asn_record(data: &str) -> Result<AsnRecord, AsnError> {
    let fields: Vec<&str> = data.split('|').map(str::trim).collect();
    if fields.len() < 5 {
        return Err(AsnError::MalformedRecord(data.to_string()));
    }

    Ok(AsnRecord {
        asn: fields[0].to_string(),
        network: fields[1].to_string(),
        country: fields[2].to_string(),
        registry: fields[3].to_string(),
        allocated: fields[4].to_string(),
    })
}

/// Source of TXT answers for a query name
#[async_trait]
pub trait TxtResolver: Send + Sync {
    /// Return every TXT answer; an empty list means the name has no records
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, AsnError>;
}

/// TXT lookups through the platform's configured DNS servers
pub struct DnsTxtResolver {
    resolver: TokioAsyncResolver,
}

impl DnsTxtResolver {
    /// Build a resolver from `/etc/resolv.conf` (or the platform equivalent)
    pub fn from_system_conf() -> Result<Self, AsnError> {
        let resolver = TokioAsyncResolver::tokio_from_system_conf()?;
        Ok(Self { resolver })
    }
}

#[async_trait]
impl TxtResolver for DnsTxtResolver {
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, AsnError> {
        debug!(query = %name, "ASN TXT lookup");

        // Fully qualified so search domains are never appended
        let fqdn = format!("{name}.");
        match self.resolver.txt_lookup(fqdn.as_str()).await {
            Ok(lookup) => Ok(lookup
                .iter()
                .map(|txt| {
                    txt.txt_data()
                        .iter()
                        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
                        .collect::<String>()
                })
                .collect()),
            Err(e) if matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. }) => Ok(Vec::new()),
            Err(e) => Err(AsnError::Dns(e)),
        }
    }
}
