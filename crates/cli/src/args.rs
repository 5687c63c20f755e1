use {
    anyhow::{Error, Result, bail},
    clap::{
        Args as ClapArgs,
        builder::{PossibleValuesParser, TypedValueParser},
    },
    const_format::concatcp,
    extip::{DnsProvider, DnsProviders, FailurePolicy, HttpProvider, HttpProviders, Policy},
    humantime::{Duration as DisplayedDuration, parse_duration},
    strum::{VariantArray, VariantNames},
    tracing::warn,
};

pub const ENV_PREFIX: &str = "EXTIP_";

// Creds: https://github.com/clap-rs/clap/discussions/4264
macro_rules! clap_enum_variants {
    ($e: ty) => {{
        let parser = PossibleValuesParser::new(<$e as VariantNames>::VARIANTS);
        parser.map(|s| s.parse::<$e>().unwrap())
    }};
}

// The global application options.
#[derive(ClapArgs)]
pub struct Global {
    /// Enable verbose output (up to 3 levels)
    #[arg(global=true, short, long, action=clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Clone, ClapArgs)]
pub struct OfPolicy {
    /// How long a single resolver may take to answer (unbounded by default)
    #[arg(
        long,
        value_name("DURATION"),
        value_parser = parse_flag_duration,
        env(concatcp!(ENV_PREFIX, "TIMEOUT")),
        hide_env=true,
    )]
    pub timeout: Option<DisplayedDuration>,

    /// How long the whole vote may take (unbounded by default)
    #[arg(
        long,
        value_name("DURATION"),
        value_parser = parse_flag_duration,
        env(concatcp!(ENV_PREFIX, "DEADLINE")),
        hide_env=true,
    )]
    pub deadline: Option<DisplayedDuration>,

    /// Report a majority of failed resolvers as such instead of an empty answer
    #[arg(
        long,
        default_value_t=false,
        default_missing_value="true",
        num_args=0..=1,
        value_name="BOOL",
        hide_default_value=true,
        hide_possible_values=true,
        env=concatcp!(ENV_PREFIX, "REJECT_FAILURES"),
        hide_env=true,
    )]
    pub reject_failures: bool,
}

#[derive(Clone, ClapArgs)]
pub struct OfDnsProviders {
    /// The list of DNS providers that should be disabled (assuming enabled all)
    #[arg(
        long,
        value_name("PROVIDER"),
        value_parser = clap_enum_variants!(DnsProvider)
    )]
    pub disable: Vec<DnsProvider>,

    /// The list of enabled providers.
    /// Computed lately based on all providers and given `disable`.
    #[arg(skip)]
    pub enable: DnsProviders,
}

#[derive(Clone, ClapArgs)]
pub struct OfHttpProviders {
    /// The list of HTTP providers that should be disabled (assuming enabled all)
    #[arg(
        long,
        value_name("PROVIDER"),
        value_parser = clap_enum_variants!(HttpProvider)
    )]
    pub disable: Vec<HttpProvider>,

    /// The list of enabled providers.
    /// Computed lately based on all providers and given `disable`.
    #[arg(skip)]
    pub enable: HttpProviders,
}

// Parser for the duration flags.
fn parse_flag_duration(s: &str) -> Result<DisplayedDuration> {
    match parse_duration(s).map_err(Error::msg)? {
        v if v.is_zero() => bail!("must be greater than zero"),
        v => Ok(v.into()),
    }
}

impl OfPolicy {
    pub fn policy(&self) -> Policy {
        let failures = match self.reject_failures {
            true => FailurePolicy::Reject,
            false => FailurePolicy::Accept,
        };

        let mut policy = Policy::default().with_failures(failures);
        if let Some(timeout) = &self.timeout {
            policy = policy.with_ask_timeout(**timeout);
        }
        if let Some(deadline) = &self.deadline {
            policy = policy.with_deadline(**deadline);
        }

        policy
    }

    pub fn setup(&mut self) {
        if self.timeout.is_none() && self.deadline.is_none() {
            warn!(concat!(
                "neither timeout nor deadline is given, ",
                "a hung resolver may keep the vote pending forever",
            ));
        }
    }
}

impl OfDnsProviders {
    pub fn setup(&mut self) -> Result<()> {
        self.enable = <DnsProvider as VariantArray>::VARIANTS.iter().copied().collect();
        self.enable.retain(|e| !self.disable.contains(e));

        if self.enable.is_empty() {
            bail!("at least one DNS provider must stay enabled")
        }
        Ok(())
    }
}

impl OfHttpProviders {
    pub fn setup(&mut self) -> Result<()> {
        self.enable = <HttpProvider as VariantArray>::VARIANTS.iter().copied().collect();
        self.enable.retain(|e| !self.disable.contains(e));

        if self.enable.is_empty() {
            bail!("at least one HTTP provider must stay enabled")
        }
        Ok(())
    }
}
