use {
    crate::{
        answer::{Answer, Reason},
        quorum::Asker,
    },
    anyhow::anyhow,
    derive_more::Display,
    hickory_resolver::{
        Resolver,
        config::{NameServerConfig, ResolverConfig},
        name_server::TokioConnectionProvider,
        proto::{
            rr::{RData, RecordType},
            xfer::Protocol,
        },
    },
    smallvec::SmallVec,
    std::{
        net::{IpAddr, Ipv4Addr, SocketAddr},
        str::from_utf8,
    },
    strum::EnumCount,
    strum_macros::{AsRefStr, EnumCount, EnumString, VariantArray, VariantNames},
    tokio::net::lookup_host,
};

/// Well-known public DNS services that tell the client its own address.
#[derive(
    Clone,
    Copy,
    Eq,
    PartialEq,
    Hash,
    Debug,
    Display,
    EnumCount,
    VariantArray,
    VariantNames,
    EnumString,
    AsRefStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum DnsProvider {
    #[display("Google Public DNS")]
    Google,
    #[display("OpenDNS")]
    OpenDns,
    #[display("Akamai")]
    Akamai,
}

pub type DnsProviders = SmallVec<[DnsProvider; DnsProvider::COUNT]>;

/// The record types an address can be read from.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Display)]
pub enum DnsRecord {
    #[display("A")]
    A,
    #[display("TXT")]
    Txt,
}

/// A single DNS question sent to a single server: one asker of the DNS pool.
#[derive(Clone, Debug, Display)]
#[display("{record} {host} @{server}")]
pub struct DnsProbe {
    host: String,
    record: DnsRecord,
    server: String,
}

impl DnsProvider {
    pub const fn host(&self) -> &'static str {
        match self {
            Self::Google => "o-o.myaddr.l.google.com.",
            Self::OpenDns => "myip.opendns.com.",
            Self::Akamai => "whoami.akamai.net.",
        }
    }

    pub const fn record(&self) -> DnsRecord {
        match self {
            Self::Google => DnsRecord::Txt,
            Self::OpenDns | Self::Akamai => DnsRecord::A,
        }
    }

    pub const fn server(&self) -> &'static str {
        match self {
            Self::Google => "ns1.google.com:53",
            Self::OpenDns => "resolver1.opendns.com:53",
            Self::Akamai => "ns1-1.akamaitech.net:53",
        }
    }

    pub fn probe(&self) -> DnsProbe {
        DnsProbe::new(self.host(), self.record(), self.server())
    }
}

impl From<DnsProvider> for DnsProbe {
    fn from(provider: DnsProvider) -> Self {
        provider.probe()
    }
}

impl DnsRecord {
    const fn record_type(self) -> RecordType {
        match self {
            Self::A => RecordType::A,
            Self::Txt => RecordType::TXT,
        }
    }
}

impl DnsProbe {
    /// `server` is a `host:port` pair; the host part may be a name,
    /// it is resolved with the system resolver right before the query.
    pub fn new<H, S>(host: H, record: DnsRecord, server: S) -> Self
    where
        H: Into<String>,
        S: Into<String>,
    {
        Self {
            host: host.into(),
            record,
            server: server.into(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn record(&self) -> DnsRecord {
        self.record
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    // Sends exactly one query to the probe's own server and reads
    // the first record of the requested type as an IPv4 address.
    async fn query(&self) -> Result<Ipv4Addr, Reason> {
        let addrs = lookup_host(self.server.as_str())
            .await
            .map_err(Reason::transport)?;
        let server = pick_server(addrs, &self.server)?;

        let mut config = ResolverConfig::new();
        config.add_name_server(NameServerConfig::new(server, Protocol::Udp));

        let mut builder =
            Resolver::builder_with_config(config, TokioConnectionProvider::default());
        builder.options_mut().attempts = 1;
        let resolver = builder.build();

        let record_type = self.record.record_type();
        let lookup = resolver
            .lookup(self.host.as_str(), record_type)
            .await
            .map_err(Reason::transport)?;

        let rdata = lookup
            .iter()
            .find(|rdata| rdata.record_type() == record_type)
            .ok_or_else(|| Reason::malformed(format!("no {} record in the answer", self.record)))?;

        extract_ipv4(rdata)
    }
}

impl Asker for DnsProbe {
    async fn ask(&self) -> Answer {
        self.query().await.map(|addr| addr.to_string()).into()
    }
}

// The server is asked over IPv4 only: over IPv6 it would see
// and report the IPv6 address of the host.
fn pick_server<I>(addrs: I, server: &str) -> Result<SocketAddr, Reason>
where
    I: IntoIterator<Item = SocketAddr>,
{
    addrs
        .into_iter()
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| Reason::transport(anyhow!("{server} has no IPv4 addresses")))
}

fn extract_ipv4(rdata: &RData) -> Result<Ipv4Addr, Reason> {
    match rdata {
        RData::A(a) => Ok(a.0),
        RData::TXT(txt) => {
            let first = txt
                .txt_data()
                .first()
                .ok_or_else(|| Reason::malformed("empty TXT record"))?;
            let literal = from_utf8(first).map_err(|_| Reason::malformed("TXT record is not UTF-8"))?;
            parse_ipv4(literal)
        }
        other => Err(Reason::malformed(format!(
            "unexpected {} record",
            other.record_type()
        ))),
    }
}

// IPv4-mapped IPv6 literals are accepted as their IPv4 counterpart.
fn parse_ipv4(literal: &str) -> Result<Ipv4Addr, Reason> {
    match literal.trim().parse::<IpAddr>() {
        Ok(IpAddr::V4(addr)) => Ok(addr),
        Ok(IpAddr::V6(addr)) => addr
            .to_ipv4_mapped()
            .ok_or_else(|| Reason::malformed(format!("{addr} is not an IPv4 address"))),
        Err(_) => Err(Reason::malformed(format!("{literal:?} is not an IP address"))),
    }
}
