//! External IP address discovery by majority vote.
//!
//! Many independent resolvers are asked at once; an address is accepted only
//! when more than half of them report the very same value.

pub mod answer;
pub mod dns;
pub mod http;
pub mod policy;
pub mod quorum;

use {
    anyhow::{Context, Result},
    strum::VariantArray,
};

pub use crate::{
    answer::{Answer, Reason},
    dns::{DnsProbe, DnsProvider, DnsProviders, DnsRecord},
    http::{HttpProbe, HttpProvider, HttpProviders},
    policy::{FailurePolicy, Policy},
    quorum::{Asker, Outcome, Quorum, Tally},
};

/// Asks every known DNS provider and returns the address most of them agree on,
/// or the empty string if they don't.
///
/// Never returns if a provider hangs and no majority forms without it.
pub async fn resolve_via_dns() -> String {
    let probes = <DnsProvider as VariantArray>::VARIANTS.iter().map(DnsProvider::probe);

    resolve_dns(probes, Policy::default())
        .await
        .map(Outcome::into_value)
        .unwrap_or_default()
}

/// Asks every known HTTP provider and returns the address most of them agree on,
/// or the empty string if they don't.
///
/// Never returns if a provider hangs and no majority forms without it.
pub async fn resolve_via_http() -> String {
    let probes = <HttpProvider as VariantArray>::VARIANTS.iter().map(HttpProvider::probe);

    resolve_http(probes, Policy::default())
        .await
        .map(Outcome::into_value)
        .unwrap_or_default()
}

/// Runs the given DNS probes through the [Quorum].
/// Fails only if no probes are given.
pub async fn resolve_dns<P>(probes: P, policy: Policy) -> Result<Outcome>
where
    P: IntoIterator<Item = DnsProbe>,
{
    let quorum = Quorum::new(probes).context("cannot build the DNS resolver pool")?;
    Ok(quorum.run(policy).await)
}

/// Runs the given HTTP probes through the [Quorum].
/// Fails only if no probes are given.
pub async fn resolve_http<P>(probes: P, policy: Policy) -> Result<Outcome>
where
    P: IntoIterator<Item = HttpProbe>,
{
    let quorum = Quorum::new(probes).context("cannot build the HTTP resolver pool")?;
    Ok(quorum.run(policy).await)
}
