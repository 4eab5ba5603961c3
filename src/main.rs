//! wilma-auth CLI entry point

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use wilma_auth::auth::SCHEME;
use wilma_auth::config::{self, Config, StatePaths};
use wilma_auth::flow::{self, CallbackHandler, Initiator};
use wilma_auth::handoff::{FileMailbox, HandoffRecord};
use wilma_auth::{portal, registrar, session, ui};

#[derive(Parser)]
#[command(name = "wilma-auth")]
#[command(about = "Log in to a Wilma portal through an OpenID provider")]
#[command(version)]
struct Cli {
    /// Directory holding the handoff and cookie files
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a login and open the provider in the browser
    Login {
        /// Portal URL, e.g. https://turku.inschool.fi
        host: Option<String>,

        /// Only print the authorization URL
        #[arg(long)]
        no_browser: bool,
    },

    /// Finish a login; started by the OS for wilma:// URLs
    Callback {
        /// The redirect URL the OS intercepted
        url: String,

        /// Wait for Enter before exiting
        #[arg(long)]
        pause: bool,
    },

    /// Remove the wilma:// handler registration
    Unregister,

    /// Show state paths and whether a login is pending
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // The OS-started callback terminal closes on exit; report first, then wait
    let pause = matches!(cli.command, Commands::Callback { pause: true, .. });
    let result = run(cli).await;
    if let Err(e) = &result {
        ui::print_error(&format!("{:#}", e));
    }
    if pause {
        wait_for_enter();
    }
    if result.is_err() {
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::load()?;
    let paths = StatePaths::new(config.state_dir(cli.data_dir.as_deref())?);
    tracing::debug!("State directory: {:?}", paths.dir);

    match cli.command {
        Commands::Login { host, no_browser } => {
            let host = host.unwrap_or_else(|| config.portal.clone());
            let open_browser = config.open_browser && !no_browser;
            run_login(&host, &paths, open_browser).await?;
        }

        Commands::Callback { url, .. } => {
            run_callback(&url, &paths).await?;
        }

        Commands::Unregister => {
            registrar::system_registrar()?.unregister(SCHEME).await?;
            ui::print_success(&format!("Removed the {}:// handler", SCHEME));
        }

        Commands::Status => {
            print_status(&config, &paths)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("wilma_auth=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wilma_auth=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run_login(host: &str, paths: &StatePaths, open_browser: bool) -> Result<()> {
    ui::print_header("Login");
    ui::print_step(&format!("Portal: {}", host));

    let client = portal::http_client()?;
    let registrar = registrar::system_registrar()?;
    let mailbox = FileMailbox::<HandoffRecord>::new(&paths.handoff);
    let template = flow::callback_template(std::env::current_exe()?, &paths.dir);

    let initiator = Initiator::new(client, &*registrar, &mailbox, template)
        .with_browser(open_browser);

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    initiator.run(host, &mut input, &mut output).await?;

    ui::print_success("Finish the login in the browser.");
    ui::print_step("A terminal window will open to store the session cookies.");
    Ok(())
}

async fn run_callback(url: &str, paths: &StatePaths) -> wilma_auth::Result<()> {
    ui::print_header("Callback");

    let client = portal::http_client()?;
    let mailbox = FileMailbox::<HandoffRecord>::new(&paths.handoff);
    let mut handler = CallbackHandler::new(client, mailbox, &paths.cookies);
    let jar = handler.run(url).await?;

    ui::print_success(&format!(
        "Logged in, {} cookies saved to {}",
        jar.len(),
        paths.cookies.display()
    ));
    Ok(())
}

fn print_status(config: &Config, paths: &StatePaths) -> Result<()> {
    ui::print_header("Status");
    println!("Portal: {}", config.portal);
    println!("State directory: {}", paths.dir.display());

    let mailbox = FileMailbox::<HandoffRecord>::new(&paths.handoff);
    if mailbox.is_occupied() {
        ui::print_warning("A login is pending; finish it in the browser or run 'wilma-auth login' again");
    } else {
        ui::print_step("No login pending");
    }

    match session::load_cookies(&paths.cookies)? {
        Some(jar) => {
            let names: Vec<&str> = jar.names().collect();
            ui::print_success(&format!("Cookies: {}", names.join(", ")));
        }
        None => ui::print_step("No cookies stored (run 'wilma-auth login')"),
    }

    Ok(())
}

fn wait_for_enter() {
    print!("\nPress Enter to close...");
    let _ = io::stdout().flush();
    let mut line = String::new();
    let _ = io::stdin().read_line(&mut line);
}
