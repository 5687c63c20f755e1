use {
    crate::{args, cmd_dns, cmd_http},
    anyhow::{Result, bail},
    clap::{Parser as ClapParser, Subcommand as ClapSubcommand},
    extip::Outcome,
    std::process::exit,
    time::{UtcOffset, macros::format_description},
    tracing::error,
    tracing_subscriber::fmt::time::OffsetTime,
};

// The application itself.
#[derive(ClapParser)]
#[command(version, about, long_about = None)]
struct App {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    args: args::Global,
}

#[derive(ClapSubcommand)]
pub enum Command {
    /// Resolve the external IP address by asking the DNS based resolvers
    Dns(cmd_dns::Args),
    /// Resolve the external IP address by asking the HTTP based resolvers
    Http(cmd_http::Args),
}

// The interface must be implemented for the type to be treated as CLI command.
//
// It is implemented by the specific CLI command's options type,
// thus representing the CLI command abstraction itself.
pub trait Executable: Sized {
    fn setup(self) -> Result<Self>;
    fn run(self, global: &args::Global) -> Result<()>;
}

// ========================================================================== //

impl App {
    fn setup(self) -> Self {
        self.setup_logging();
        self
    }

    // Logs go to stderr: stdout is reserved for the resolved address.
    fn setup_logging(&self) {
        let traces_timer = OffsetTime::new(
            UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC),
            format_description!("[hour]:[minute]:[second].[subsecond digits:3]"),
        );

        let max_log_level = match self.args.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        tracing_subscriber::fmt()
            .compact()
            .with_timer(traces_timer)
            .with_ansi(true)
            .with_max_level(max_log_level)
            .with_writer(std::io::stderr)
            .init();
    }
}

// Prints the agreed address, or turns any other [Outcome] into an error.
pub fn report(outcome: Outcome) -> Result<()> {
    match outcome {
        Outcome::Agreed(addr) if !addr.is_empty() => {
            println!("{addr}");
            Ok(())
        }
        Outcome::Agreed(_) => bail!("most of the resolvers failed to answer"),
        other => bail!("resolvers did not agree: {}", other),
    }
}

// ========================================================================== //

// Initializes logging, parses CLI and ENV parameters and executes
// the requested command. Exits the process with non-zero code on failure.
pub fn exec() {
    let app = App::parse().setup();

    if let Err(err) = match app.command {
        Command::Dns(cmd_args) => cmd_args.setup().and_then(|cmd| cmd.run(&app.args)),
        Command::Http(cmd_args) => cmd_args.setup().and_then(|cmd| cmd.run(&app.args)),
    } {
        let err = format!("{}, because {}", err, err.root_cause());
        error!(err = %err, "critical error");
        exit(1);
    }
}
