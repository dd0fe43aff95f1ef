use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use lazysession_core::config::{self, BackendKind, SessionConfig};
use lazysession_core::cookie::{CookieBackend, TimestampSigner};
use lazysession_core::{Session, SessionCookie, SessionData, SessionFactory};

#[derive(Parser)]
#[command(
    name = "lazysession",
    about = "Inspect and exercise lazysession cookie sessions",
    version = lazysession_core::VERSION,
)]
struct Cli {
    /// Config file (default: LAZYSESSION_* env vars over ~/.lazysession/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a JSON object as a signed session cookie value
    Sign {
        /// Session content, e.g. '{"user":"alice"}'
        data: String,
    },
    /// Decode and verify a session cookie value
    Inspect {
        /// Cookie value to inspect
        token: String,
    },
    /// Print a new random secret key
    GenSecret,
    /// Show or initialize configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Run request cycles against the configured backend
    Simulate {
        /// Cookie value presented by the client on the first request
        #[arg(short, long)]
        token: Option<String>,
        /// Set a key (key=value, value parsed as JSON when possible)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
        /// Read a key
        #[arg(long = "get", value_name = "KEY")]
        get: Vec<String>,
        /// Remove a key
        #[arg(long = "remove", value_name = "KEY")]
        remove: Vec<String>,
        /// Clear the session
        #[arg(long)]
        clear: bool,
        /// Mark the session accessed without reading it
        #[arg(long)]
        touch: bool,
        /// Number of requests; each one presents the previous response's cookie
        #[arg(short, long, default_value_t = 1)]
        rounds: u32,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Write a default configuration file with a fresh secret key
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lazysession=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sign { data } => cmd_sign(cli.config, data)?,
        Commands::Inspect { token } => cmd_inspect(cli.config, token)?,
        Commands::GenSecret => println!("{}", lazysession_core::util::generate_secret()),
        Commands::Config { command } => match command {
            ConfigCommands::Show => cmd_config_show(cli.config)?,
            ConfigCommands::Init { force } => cmd_config_init(cli.config, force)?,
        },
        Commands::Simulate {
            token,
            set,
            get,
            remove,
            clear,
            touch,
            rounds,
        } => {
            let ops = RequestOps {
                set: parse_assignments(&set)?,
                get,
                remove,
                clear,
                touch,
            };
            cmd_simulate(cli.config, token, ops, rounds).await?
        }
    }

    Ok(())
}

// ====== Commands ======

fn resolve_config(path: Option<PathBuf>) -> Result<SessionConfig> {
    match path {
        Some(path) => config::read_config(&path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(config::load_config_from_env()),
    }
}

/// Cookie backend matching the configuration, for the token subcommands.
fn cookie_backend(cfg: &SessionConfig) -> Result<CookieBackend<TimestampSigner>> {
    let secret = cfg
        .secret_key
        .as_deref()
        .filter(|s| !s.is_empty())
        .context("No secret key configured (set LAZYSESSION_SECRET_KEY or run `lazysession config init`)")?;
    Ok(CookieBackend::new(
        TimestampSigner::with_salt(secret, &cfg.salt),
        cfg.max_age,
    ))
}

fn cmd_sign(config_path: Option<PathBuf>, data: String) -> Result<()> {
    let cfg = resolve_config(config_path)?;
    let content: SessionData =
        serde_json::from_str(&data).context("Session content must be a JSON object")?;
    let token = cookie_backend(&cfg)?.save_content(&content)?;
    println!("{}", token);
    Ok(())
}

fn cmd_inspect(config_path: Option<PathBuf>, token: String) -> Result<()> {
    let cfg = resolve_config(config_path)?;
    let result = match cfg.backend {
        BackendKind::Cookie => CookieBackend::plain(cfg.max_age).try_load_content(&token),
        _ => cookie_backend(&cfg)?.try_load_content(&token),
    };

    match result {
        Ok(content) => {
            println!("{}", serde_json::to_string_pretty(&content)?);
            Ok(())
        }
        Err(e) => bail!("Token rejected: {}", e),
    }
}

fn cmd_config_show(config_path: Option<PathBuf>) -> Result<()> {
    let mut cfg = resolve_config(config_path)?;
    if cfg.secret_key.is_some() {
        cfg.secret_key = Some("********".to_string());
    }
    println!("{}", serde_json::to_string_pretty(&cfg)?);
    Ok(())
}

fn cmd_config_init(config_path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = config_path.unwrap_or_else(config::get_config_path);
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    let cfg = SessionConfig {
        secret_key: Some(lazysession_core::util::generate_secret()),
        ..SessionConfig::default()
    };
    config::save_config(&cfg, Some(&path))?;
    println!("Wrote {}", path.display());
    Ok(())
}

struct RequestOps {
    set: Vec<(String, serde_json::Value)>,
    get: Vec<String>,
    remove: Vec<String>,
    clear: bool,
    touch: bool,
}

fn parse_assignments(raw: &[String]) -> Result<Vec<(String, serde_json::Value)>> {
    raw.iter()
        .map(|item| {
            let Some((key, value)) = item.split_once('=') else {
                bail!("Expected KEY=VALUE, got {:?}", item);
            };
            let value = serde_json::from_str(value)
                .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
            Ok((key.to_string(), value))
        })
        .collect()
}

async fn cmd_simulate(
    config_path: Option<PathBuf>,
    mut token: Option<String>,
    ops: RequestOps,
    rounds: u32,
) -> Result<()> {
    let cfg = resolve_config(config_path)?;
    let factory = config::build_factory(&cfg).await?;
    tracing::info!("Simulating {} request(s) against the {} backend", rounds, cfg.backend);

    for round in 1..=rounds {
        let mut session = factory.open(token.clone());

        if ops.touch {
            session.touch();
        }
        for key in &ops.get {
            let value = session.get(key).await?;
            println!("[{}] get {} = {}", round, key, display_value(value.as_ref()));
        }
        for key in &ops.remove {
            let removed = session.remove(key).await?;
            println!("[{}] remove {} = {}", round, key, display_value(removed.as_ref()));
        }
        if ops.clear {
            session.clear();
            println!("[{}] clear", round);
        }
        // Writes only on the first request so later rounds show the joined state.
        if round == 1 {
            for (key, value) in &ops.set {
                session.insert(key, value.clone()).await?;
                println!("[{}] set {} = {}", round, key, value);
            }
        }

        let cookie = session.finalize().await?;
        print_cookie(round, &cookie);

        if cookie.accessed {
            token = cookie.content;
        }
    }

    Ok(())
}

fn display_value(value: Option<&serde_json::Value>) -> String {
    value.map_or_else(|| "<missing>".to_string(), |v| v.to_string())
}

fn print_cookie(round: u32, cookie: &SessionCookie) {
    if !cookie.accessed {
        println!("[{}] session not accessed, no Set-Cookie", round);
        return;
    }
    let max_age = cookie
        .header_max_age()
        .map_or_else(|| "session".to_string(), |secs| secs.to_string());
    match &cookie.content {
        Some(content) => println!("[{}] Set-Cookie value={} max-age={}", round, content, max_age),
        None => println!("[{}] Set-Cookie removal max-age={}", round, max_age),
    }
}
