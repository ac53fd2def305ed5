use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use kubeql_core::config::Config;
use kubeql_kubehub::{ClientOptions, KubeLister};
use kubeql_query::Engine;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod output;

use output::Format;

#[derive(Parser, Debug)]
#[command(name = "kubeql", version, about = "Query Kubernetes resources with SQL-like SELECT statements")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Format::Table)]
    output: Format,

    /// Do not print the table header row
    #[arg(short = 'H', long = "no-headers", global = true, action = ArgAction::SetTrue)]
    no_headers: bool,

    /// Debug level (0 = off); also raises the log level unless KUBEQL_LOG is set
    #[arg(long = "debug", global = true, default_value_t = 0)]
    debug: u8,

    /// Path to the kubeconfig file
    #[arg(long = "kubeconfig", global = true)]
    kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long = "context", global = true)]
    context: Option<String>,

    /// Namespace for queries whose FROM names none
    #[arg(short = 'n', long = "namespace", global = true)]
    namespace: Option<String>,

    /// Query every namespace, overriding FROM
    #[arg(short = 'A', long = "all-namespaces", global = true, action = ArgAction::SetTrue)]
    all_namespaces: bool,

    /// Config file with extra aliases and table fields (default: ~/.kube/kubectl-sql.json)
    #[arg(short = 'q', long = "sql-config", global = true, env = "KUBEQL_CONFIG")]
    sql_config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,

    /// Query, e.g. "SELECT name, status.phase FROM pods WHERE phase = 'Running'"
    query: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print client and server versions and the current namespace
    Version,
}

impl Cli {
    fn client_options(&self) -> ClientOptions {
        ClientOptions {
            kubeconfig: self.kubeconfig.clone(),
            context: self.context.clone(),
            namespace: self.namespace.clone(),
        }
    }
}

fn init_tracing(debug: u8) {
    let fallback = match debug {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env = std::env::var("KUBEQL_LOG").unwrap_or_else(|_| fallback.to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let res = match &cli.command {
        Some(Commands::Version) => version(&cli).await,
        None => query(&cli).await,
    };
    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!(error = ?e, "command failed");
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn query(cli: &Cli) -> Result<()> {
    let text = cli.query.join(" ");
    if text.trim().is_empty() {
        bail!("missing query, e.g. kubeql \"SELECT name FROM pods\"");
    }

    let config = match cli.sql_config.clone().or_else(Config::default_path) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };
    let engine = Engine::new(config.alias_table(), config.projection_table());

    let mut opts = engine.parse(&text)?;
    opts.from = opts.from.with_overrides(cli.namespace.as_deref(), cli.all_namespaces);
    opts.debug_level = cli.debug;
    info!(query = %opts, "parsed");

    let lister = KubeLister::connect(&cli.client_options()).await?;
    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if signal::ctrl_c().await.is_ok() {
                warn!("interrupted, cancelling query");
                cancel.cancel();
            }
        }
    });
    let res = engine.run(&opts, &lister, &cancel).await;
    interrupt.abort();
    let res = res?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    output::print(&mut out, &res, cli.output, !cli.no_headers)?;
    out.flush().context("writing output")?;
    Ok(())
}

async fn version(cli: &Cli) -> Result<()> {
    let opts = cli.client_options();
    let (server, namespace) = match KubeLister::connect(&opts).await {
        Ok(lister) => {
            let server = lister.server_version().await.unwrap_or_else(|e| {
                debug!(error = %e, "server version unavailable");
                "unavailable".to_string()
            });
            (server, lister.current_namespace().to_string())
        }
        Err(e) => {
            debug!(error = %e, "no cluster connection");
            ("unavailable".to_string(), opts.namespace.unwrap_or_else(|| "default".to_string()))
        }
    };
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "Client version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(out, "Server version: {}", server)?;
    writeln!(out, "Current namespace: {}", namespace)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn query_words_are_joined() {
        let cli = Cli::try_parse_from(["kubeql", "-A", "-o", "json", "SELECT", "name", "FROM", "pods"]).unwrap();
        assert!(cli.all_namespaces);
        assert_eq!(cli.output, Format::Json);
        assert!(cli.command.is_none());
        assert_eq!(cli.query.join(" "), "SELECT name FROM pods");
    }

    #[test]
    fn version_subcommand() {
        let cli = Cli::try_parse_from(["kubeql", "version", "--context", "kind"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Version)));
        assert_eq!(cli.context.as_deref(), Some("kind"));
    }

    #[test]
    fn flags_reach_client_options() {
        let cli = Cli::try_parse_from(["kubeql", "-n", "kube-system", "--kubeconfig", "/tmp/kc", "-H", "FROM pods"]).unwrap();
        let opts = cli.client_options();
        assert_eq!(opts.namespace.as_deref(), Some("kube-system"));
        assert_eq!(opts.kubeconfig, Some(PathBuf::from("/tmp/kc")));
        assert!(cli.no_headers);
    }
}
