use {
    crate::{Executable, app, args},
    anyhow::{Context, Result},
    clap::Args as ClapArgs,
    extip::HttpProvider,
    tracing::debug,
};

/// The list of options for the "http" command.
#[derive(ClapArgs)]
pub struct Args {
    #[command(flatten)]
    providers: args::OfHttpProviders,

    #[command(flatten)]
    policy: args::OfPolicy,
}

impl Executable for Args {
    fn setup(mut self) -> Result<Self> {
        self.providers.setup()?;
        self.policy.setup();
        Ok(self)
    }

    // The "main" function for the "http" command.
    // Prepares the Tokio runtime and lets the enabled HTTP providers vote.
    #[tokio::main]
    async fn run(self, _: &args::Global) -> Result<()> {
        debug!(providers = ?self.providers.enable, "asking HTTP providers");

        let probes = self.providers.enable.iter().map(HttpProvider::probe);
        let outcome = extip::resolve_http(probes, self.policy.policy())
            .await
            .with_context(|| "cannot resolve the address via HTTP")?;

        app::report(outcome)
    }
}
