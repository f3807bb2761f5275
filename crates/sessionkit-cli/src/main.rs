//! sessionkit - drive the auth session lifecycle from the command line.
//!
//! Every invocation behaves like an app start: the persisted session is
//! restored first, then the requested transition runs and the resulting
//! state is printed.

use std::io;

use anyhow::{bail, Result};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sessionkit_core::config::Config;
use sessionkit_core::{AuthContainer, AuthState, ChannelNotifier, Credentials, Transition};

/// Environment variable checked before prompting for a password
const PASSWORD_ENV: &str = "SESSIONKIT_PASSWORD";

const USAGE: &str = "\
Usage: sessionkit <command>

Commands:
  status                     Show the restored session
  login <username> [--keep]  Log in; --keep saves the session for next time
  logout                     Log out and forget the saved session
  photo <uri>                Change the profile photo of the saved session

Environment:
  SESSIONKIT_PASSWORD        Password for login (prompted if unset)
  RUST_LOG                   Log filter, e.g. RUST_LOG=debug";

enum Command {
    Status,
    Login { username: String, keep: bool },
    Logout,
    Photo { image: String },
}

impl Command {
    fn parse(args: &[String]) -> Result<Self> {
        match args.first().map(String::as_str) {
            None | Some("status") => Ok(Command::Status),
            Some("login") => {
                let mut username = None;
                let mut keep = false;
                for arg in &args[1..] {
                    match arg.as_str() {
                        "--keep" | "-k" => keep = true,
                        other if username.is_none() => username = Some(other.to_string()),
                        other => bail!("Unexpected argument: {}", other),
                    }
                }
                match username {
                    Some(username) => Ok(Command::Login { username, keep }),
                    None => bail!("login needs a username"),
                }
            }
            Some("logout") => Ok(Command::Logout),
            Some("photo") => match args.get(1) {
                Some(image) => Ok(Command::Photo {
                    image: image.clone(),
                }),
                None => bail!("photo needs an image uri"),
            },
            Some(other) => bail!("Unknown command: {}", other),
        }
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn read_password() -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }
    Ok(rpassword::prompt_password("Password: ")?)
}

fn print_notifications(rx: &mut UnboundedReceiver<String>) {
    while let Ok(message) = rx.try_recv() {
        eprintln!("! {}", message);
    }
}

fn print_outcome(outcome: &Transition) {
    if let Some(rejection) = outcome.rejection() {
        eprintln!("rejected: {}", rejection);
    }
    if let Some(warning) = outcome.storage_warning() {
        eprintln!("warning: {}", warning);
    }
}

fn print_state(state: &AuthState) {
    println!("{}", state);
    if let Some(user) = state.user() {
        println!("  photo: {}", user.image);
    }
}

async fn run(auth: &AuthContainer, command: Command) -> Result<Transition> {
    let outcome = match command {
        Command::Status => return Ok(auth.restore_session().await),
        Command::Login { username, keep } => {
            let password = read_password()?;
            auth.login(Credentials::new(username, password).keep(keep)).await
        }
        Command::Logout => auth.logout().await,
        Command::Photo { image } => auth.update_photo(image).await,
    };
    Ok(outcome)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if matches!(args.first().map(String::as_str), Some("-h" | "--help" | "help")) {
        println!("{}", USAGE);
        return Ok(());
    }
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    let config = Config::load()?;
    debug!(?config, "Configuration loaded");

    let (notifier, mut notifications) = ChannelNotifier::new();
    let auth = config.open(notifier)?;

    if !matches!(command, Command::Status) {
        let restored = auth.restore_session().await;
        debug!(restored = restored.is_fulfilled(), "Startup restore finished");
    }

    let show_age = matches!(command, Command::Status);
    let outcome = run(&auth, command).await?;
    print_notifications(&mut notifications);
    print_outcome(&outcome);
    print_state(&auth.state());
    if show_age && auth.state().is_logged_in() {
        if let Some(age) = config.session_age().await? {
            println!("  saved: {}", age);
        }
    }

    info!(logged_in = auth.state().is_logged_in(), "sessionkit finished");
    Ok(())
}
