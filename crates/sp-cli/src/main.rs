use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use sp_session::{ClientConfig, LocalSessionCodec, RevokeOutcome, SecureSession, SessionState};

#[derive(Parser)]
#[command(name = "sealpay")]
#[command(about = "SealPay wallet session client", long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the API base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show this device's id, label and key fingerprint
    Device,

    /// Sign in; the password is prompted for when not given
    Login {
        email: String,
        #[arg(long)]
        password: Option<String>,
    },

    /// Refresh and show the signed-in profile
    Status {
        /// Show the cached snapshot without contacting the server
        #[arg(long)]
        offline: bool,
    },

    /// List the account's active sessions
    Sessions,

    /// Revoke a session by id; revoking this device's session signs out
    Revoke { session_id: String },

    /// Sign out on this device
    Logout,

    /// Poll exchange rates until interrupted
    WatchRates {
        /// Poll interval in seconds
        #[arg(short, long)]
        interval: Option<u64>,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => sp_store::paths::config_file()?,
    };
    let mut config = ClientConfig::load(Some(&path))?;
    if let Some(url) = &cli.api_url {
        config.api_base_url = url.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let session = SecureSession::from_config(&config)?;

    match cli.command {
        Commands::Device => show_device(&session),
        Commands::Login { email, password } => login(&session, &email, password).await,
        Commands::Status { offline } => status(&session, offline).await,
        Commands::Sessions => sessions(&session).await,
        Commands::Revoke { session_id } => revoke(&session, &session_id).await,
        Commands::Logout => {
            session.logout()?;
            println!("Signed out.");
            Ok(())
        }
        Commands::WatchRates { interval } => {
            let period = interval
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.rate_refresh_interval());
            watch_rates(&session, period).await
        }
    }
}

fn show_device(session: &SecureSession) -> Result<()> {
    let device = session.device();
    println!("Device id:    {}", device.device_id);
    println!("Device name:  {}", device.device_name);
    println!("Public key:   {}", session.public_key().to_b64());
    println!("Fingerprint:  {}", session.public_key().fingerprint());
    println!("State:        {:?}", session.state());
    Ok(())
}

async fn login(session: &SecureSession, email: &str, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(pw) => pw,
        None => rpassword::prompt_password("Password: ")
            .map_err(|e| anyhow!("password prompt: {e}"))?,
    };
    let data = session.login(email, &password).await?;
    let name = data
        .user
        .as_ref()
        .map(|u| format!("{} {}", u.first_name, u.last_name))
        .unwrap_or_default();
    println!("Signed in as {}", name.trim());
    println!("{} wallet(s), {} transaction(s)", data.wallets.len(), data.transactions.len());
    Ok(())
}

async fn status(session: &SecureSession, offline: bool) -> Result<()> {
    if session.state() != SessionState::Authenticated {
        println!("Not signed in.");
        return Ok(());
    }
    if !offline {
        session
            .refresh_all()
            .await
            .context("refreshing profile")?;
    }
    let data = session.get_user_data();
    if let Some(user) = &data.user {
        println!("{} {} <{}>", user.first_name, user.last_name, user.email);
    }
    for wallet in &data.wallets {
        println!("  {:<6} {:>14.2}", wallet.currency, wallet.balance);
    }
    let stat = &data.tx_stat;
    println!(
        "Transactions: {} total, {} pending, {} successful, {} failed",
        stat.total, stat.pending, stat.successful, stat.failed
    );
    Ok(())
}

async fn sessions(session: &SecureSession) -> Result<()> {
    let list = LocalSessionCodec::new(session.clone()).list().await?;
    let current = &list.current;
    println!(
        "* {}  {:<10} {:<15} {}",
        current.id, current.device_type, current.ip_address, current.geo_location.country
    );
    for other in &list.others {
        println!(
            "  {}  {:<10} {:<15} {}",
            other.id, other.device_type, other.ip_address, other.geo_location.country
        );
    }
    Ok(())
}

async fn revoke(session: &SecureSession, session_id: &str) -> Result<()> {
    match LocalSessionCodec::new(session.clone()).revoke(session_id).await? {
        RevokeOutcome::SignedOut => println!("Revoked this device's session; signed out."),
        RevokeOutcome::Removed => println!("Revoked session {session_id}."),
    }
    Ok(())
}

async fn watch_rates(session: &SecureSession, period: Duration) -> Result<()> {
    if session.state() != SessionState::Authenticated {
        bail!("not signed in");
    }
    let task = session.spawn_rate_refresh(period);
    let mut state = session.subscribe();
    let mut ticker = tokio::time::interval(period);
    info!(period_secs = period.as_secs(), "watching exchange rates; Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = state.changed() => {
                if changed.is_err() || !state.borrow().is_authenticated() {
                    println!("Session ended.");
                    break;
                }
            }
            _ = ticker.tick() => {
                for rate in session.get_user_data().exchange_rate {
                    println!("{}/{} {:.4}", rate.from, rate.to, rate.rate);
                }
            }
        }
    }
    task.shutdown().await;
    Ok(())
}
