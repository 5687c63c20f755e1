use {
    crate::{Executable, app, args},
    anyhow::{Context, Result},
    clap::Args as ClapArgs,
    extip::DnsProvider,
    tracing::debug,
};

/// The list of options for the "dns" command.
#[derive(ClapArgs)]
pub struct Args {
    #[command(flatten)]
    providers: args::OfDnsProviders,

    #[command(flatten)]
    policy: args::OfPolicy,
}

impl Executable for Args {
    fn setup(mut self) -> Result<Self> {
        self.providers.setup()?;
        self.policy.setup();
        Ok(self)
    }

    // The "main" function for the "dns" command.
    // Prepares the Tokio runtime and lets the enabled DNS providers vote.
    #[tokio::main]
    async fn run(self, _: &args::Global) -> Result<()> {
        debug!(providers = ?self.providers.enable, "asking DNS providers");

        let probes = self.providers.enable.iter().map(DnsProvider::probe);
        let outcome = extip::resolve_dns(probes, self.policy.policy())
            .await
            .with_context(|| "cannot resolve the address via DNS")?;

        app::report(outcome)
    }
}
