use {
    crate::{
        answer::{Answer, Reason},
        quorum::Asker,
    },
    derive_more::Display,
    reqwest::Client,
    smallvec::SmallVec,
    strum::EnumCount,
    strum_macros::{AsRefStr, EnumCount, EnumString, VariantArray, VariantNames},
};

/// Plain-text IP echo services: each replies with the caller's address
/// as the whole response body.
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
pub enum HttpProvider {
    #[display("v4.ident.me")]
    Ident,
    #[display("whatismyip.akamai.com")]
    Akamai,
    #[display("checkip.amazonaws.com")]
    Amazon,
    #[display("ipecho.net")]
    IpEcho,
    #[display("inet-ip.info")]
    InetIp,
    #[display("eth0.me")]
    Eth0,
    #[display("wgetip.com")]
    WgetIp,
    #[display("bot.whatismyipaddress.com")]
    WhatIsMyIpAddress,
    #[display("ipof.in")]
    IpOf,
    #[display("smart-ip.net")]
    SmartIp,
    #[display("ip.tyk.nu")]
    Tyk,
    #[display("tnx.nl")]
    Tnx,
    #[display("l2.io")]
    L2,
    #[display("api.ipify.org")]
    Ipify,
    #[display("myexternalip.com")]
    MyExternalIp,
    #[display("icanhazip.com")]
    IcanHazIp,
    #[display("ifconfig.io")]
    IfconfigIo,
    #[display("wtfismyip.com")]
    WtfIsMyIp,
}

pub type HttpProviders = SmallVec<[HttpProvider; HttpProvider::COUNT]>;

/// A single GET request to a single URL: one asker of the HTTP pool.
#[derive(Clone, Debug, Display)]
#[display("GET {url}")]
pub struct HttpProbe {
    url: String,
}

impl HttpProvider {
    pub const fn request_uri(&self) -> &'static str {
        match self {
            Self::Ident => "http://v4.ident.me/",
            Self::Akamai => "http://whatismyip.akamai.com/",
            Self::Amazon => "http://checkip.amazonaws.com/",
            Self::IpEcho => "http://ipecho.net/plain",
            Self::InetIp => "http://inet-ip.info/ip",
            Self::Eth0 => "http://eth0.me/",
            Self::WgetIp => "http://wgetip.com/",
            Self::WhatIsMyIpAddress => "http://bot.whatismyipaddress.com/",
            Self::IpOf => "http://ipof.in/txt",
            Self::SmartIp => "http://smart-ip.net/myip",
            Self::Tyk => "https://ip.tyk.nu/",
            Self::Tnx => "https://tnx.nl/ip",
            Self::L2 => "https://l2.io/ip",
            Self::Ipify => "https://api.ipify.org/",
            Self::MyExternalIp => "https://myexternalip.com/raw",
            Self::IcanHazIp => "https://icanhazip.com",
            Self::IfconfigIo => "https://ifconfig.io/ip",
            Self::WtfIsMyIp => "https://wtfismyip.com/text",
        }
    }

    pub fn probe(&self) -> HttpProbe {
        HttpProbe::new(self.request_uri())
    }
}

impl From<HttpProvider> for HttpProbe {
    fn from(provider: HttpProvider) -> Self {
        provider.probe()
    }
}

impl HttpProbe {
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    // Performs the request on a client of its own, so nothing is shared
    // with the other probes. The response is consumed by reading the body,
    // or dropped on the early returns.
    async fn fetch(&self) -> Result<String, Reason> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Reason::transport)?;

        let response = client
            .get(self.url.as_str())
            .send()
            .await
            .map_err(Reason::transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Reason::Status(status));
        }

        let body = response.text().await.map_err(Reason::transport)?;
        Ok(body.trim().to_string())
    }
}

impl Asker for HttpProbe {
    async fn ask(&self) -> Answer {
        self.fetch().await.into()
    }
}
