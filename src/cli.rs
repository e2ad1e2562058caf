//! Command line surface of `nq`.

use crate::app::AppService;
use crate::env_file::{resolve_env_file_for_write, write_env_value};
use crate::error::{NqError, NqResult};
use crate::server::{shutdown_signal, QueryServer, DEFAULT_ADDR};
use crate::settings::{Overrides, Settings, NEPTUNE_TOKEN};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use nq_aws::secrets::SecretsManagerClient;
use nq_aws::{AwsClient, AwsRegion, DefaultChain};
use nq_graph::{cache_key, EndpointCache};
use nq_login::{LoginService, DEFAULT_SECRET_NAME};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

const LOGIN_PROFILE: &str = "dsoadev";
const LOGIN_REGION: &str = "us-east-2";

const LONG_ABOUT: &str = "\
Execute Gremlin or Cypher queries against a Neptune GraphQL endpoint.

    echo \"query\" | nq [--type gremlin|cypher]
    nq [--type gremlin|cypher] \"query\"
    nq [--type gremlin|cypher] <query_file>";

/// Execute Gremlin or Cypher queries against a Neptune GraphQL endpoint.
#[derive(Debug, Parser)]
#[command(name = "nq", version, long_about = LONG_ABOUT)]
pub struct Cli {
    /// Path to a .env file to load before executing (defaults to ./.env, then ~/.env)
    #[arg(long, global = true, value_name = "PATH")]
    pub env_file: Option<String>,

    /// AWS shared config profile to use for authentication
    #[arg(long, global = true, value_name = "PROFILE")]
    pub aws_profile: Option<String>,

    /// Override the AWS region used for discovery and signing
    #[arg(long, global = true, value_name = "REGION")]
    pub aws_region: Option<String>,

    /// The type of query to execute
    #[arg(long = "type", value_enum, default_value_t = QueryLanguage::Gremlin)]
    pub query_type: QueryLanguage,

    /// Inline query, or a path to a file holding one; stdin is read when omitted
    #[arg(value_name = "QUERY_OR_FILE")]
    pub input: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch a fresh NEPTUNE_TOKEN using Azure AD client credentials.
    ///
    /// The secret is read with --aws-profile (default dsoadev) in
    /// --aws-region (default us-east-2).
    Login(LoginArgs),
    /// Start a web UI for running queries
    Server {
        /// Address to bind the HTTP server to
        #[arg(long, default_value = DEFAULT_ADDR)]
        addr: String,
    },
    /// Inspect or reset the endpoint cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Generate shell completion scripts
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, clap::Args)]
pub struct LoginArgs {
    /// Secrets Manager secret that holds the API auth credentials
    #[arg(long, default_value = DEFAULT_SECRET_NAME)]
    pub secret_name: String,

    /// Do not write NEPTUNE_TOKEN to an env file
    #[arg(long)]
    pub no_write: bool,

    /// Print the raw access token to stdout (use with caution)
    #[arg(long)]
    pub print_token: bool,
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum CacheAction {
    /// Print the cache file location
    Path,
    /// Print the cached endpoints
    Show,
    /// Forget the endpoint of the current profile and region
    Forget,
    /// Delete the cache file
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QueryLanguage {
    Gremlin,
    Cypher,
}

impl QueryLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gremlin => "gremlin",
            Self::Cypher => "cypher",
        }
    }
}

/// Where the query text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryInput {
    Inline(String),
    File(PathBuf),
    Stdin,
}

impl QueryInput {
    /// An argument naming an existing file is read from disk; anything else
    /// is taken as the query itself.
    pub fn from_arg(arg: Option<&str>) -> NqResult<Self> {
        let Some(arg) = arg else {
            return Ok(Self::Stdin);
        };
        match std::fs::metadata(arg) {
            Ok(meta) if meta.is_dir() => Err(NqError::Input(format!(
                "provided path {:?} is a directory, expected a file",
                arg
            ))),
            Ok(_) => Ok(Self::File(PathBuf::from(arg))),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                Err(NqError::io(format!("failed to stat {:?}", arg), e))
            }
            Err(_) => Ok(Self::Inline(arg.to_string())),
        }
    }
}

impl Cli {
    /// Profile and region for reading the login secret.
    fn login_target(&self) -> (&str, &str) {
        (
            self.aws_profile.as_deref().unwrap_or(LOGIN_PROFILE),
            self.aws_region.as_deref().unwrap_or(LOGIN_REGION),
        )
    }

    fn overrides(&self) -> Overrides {
        Overrides {
            aws_profile: self.aws_profile.clone(),
            aws_region: self.aws_region.clone(),
        }
    }
}

/// Dispatch a parsed command line. The environment must already be loaded.
pub async fn run(cli: Cli) -> NqResult<()> {
    match &cli.command {
        None => run_query(&cli).await,
        Some(Command::Login(args)) => run_login(&cli, args).await,
        Some(Command::Server { addr }) => run_server(&cli, addr).await,
        Some(Command::Cache { action }) => run_cache(&cli, *action),
        Some(Command::Completion { shell }) => {
            clap_complete::generate(*shell, &mut Cli::command(), "nq", &mut io::stdout());
            Ok(())
        }
    }
}

async fn run_query(cli: &Cli) -> NqResult<()> {
    let input = QueryInput::from_arg(cli.input.as_deref())?;
    let language = cli.query_type.as_str();
    let settings = Settings::from_environment(&cli.overrides())?;
    let app = AppService::connect(&settings).await?;

    let run = async {
        match &input {
            QueryInput::Inline(query) => app
                .execute_query(query, language)
                .await
                .map_err(NqError::from),
            QueryInput::File(path) => app.execute(Some(path), language).await,
            QueryInput::Stdin => app.execute(None, language).await,
        }
    };
    let output = tokio::select! {
        res = run => res?,
        _ = tokio::signal::ctrl_c() => return Err(NqError::Interrupted),
    };

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", output.processed).map_err(|e| NqError::io("write output", e))
}

async fn run_login(cli: &Cli, args: &LoginArgs) -> NqResult<()> {
    let (profile, region) = cli.login_target();
    let credentials = Arc::new(DefaultChain::new(Some(profile)));
    let client = AwsClient::new(credentials, AwsRegion::new(region), None);
    let secrets = Arc::new(SecretsManagerClient::new(client));

    let token = LoginService::new(&args.secret_name, secrets).login().await?;

    if !args.no_write {
        let path = resolve_env_file_for_write(cli.env_file.as_deref())?;
        write_env_value(&path, NEPTUNE_TOKEN, &token.access_token)?;
        tracing::info!(env_file = %path.display(), "updated {}", NEPTUNE_TOKEN);
    }
    if args.print_token {
        println!("{}", token.access_token);
    }

    let expires = token.expires_at.with_timezone(&chrono::Local).to_rfc2822();
    tracing::info!(token_type = %token.token_type, expires = %expires, "token acquired");
    Ok(())
}

async fn run_server(cli: &Cli, addr: &str) -> NqResult<()> {
    let settings = Settings::from_environment(&cli.overrides())?;
    let app = AppService::connect(&settings).await?;
    tracing::info!(endpoint = app.endpoint(), "serving queries");

    Arc::new(QueryServer::new(Arc::new(app)))
        .start_server(addr, shutdown_signal())
        .await
}

fn run_cache(cli: &Cli, action: CacheAction) -> NqResult<()> {
    let cache = EndpointCache::from_environment()?;
    match action {
        CacheAction::Path => println!("{}", cache.path().display()),
        CacheAction::Show => {
            let content = serde_json::to_string_pretty(&cache.read())
                .map_err(|e| NqError::Config(format!("encode cache: {}", e)))?;
            println!("{}", content);
        }
        CacheAction::Forget => {
            let settings = Settings::from_environment(&cli.overrides())?;
            let key = cache_key(settings.profile_name(), settings.region_name());
            if cache.invalidate(&key)? {
                println!("removed cached endpoint for {}", key);
            } else {
                println!("no cached endpoint for {}", key);
            }
        }
        CacheAction::Clear => {
            cache.clear()?;
            println!("removed {}", cache.path().display());
        }
    }
    Ok(())
}
