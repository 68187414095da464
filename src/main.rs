//! Not a cPanel - 单机 Docker 容器管理面板
//!
//! Usage:
//! - Run the panel: `notacpanel` or `notacpanel serve --port 5000`
//! - Write a fresh config: `notacpanel init-config --username admin`
//! - Change the admin password: `notacpanel set-password`
//! - Check a password against the config: `echo secret | notacpanel verify-password`

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::{Path, PathBuf};

use notacpanel::config::env::config_path_from_env;
use notacpanel::config::{EnvConfig, PanelConfig};
use notacpanel::services::password::{hash_password, verify_password};
use notacpanel::services::signing::generate_token;

/// Not a cPanel - Docker container control panel
#[derive(Parser)]
#[command(name = "notacpanel", version, about)]
struct Cli {
    /// INI config file (overrides NOTACPANEL_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve {
        /// Listening port (overrides PORT)
        #[arg(long)]
        port: Option<u16>,

        /// Listening address (overrides NOTACPANEL_BIND)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Write a fresh config file with owner-only permissions
    InitConfig {
        /// Admin username
        #[arg(long, default_value = "admin")]
        username: String,

        /// Admin password (generated and printed once when omitted)
        #[arg(long)]
        password: Option<String>,

        /// Server address shown on generated index pages
        #[arg(long)]
        server_ip: Option<String>,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Hash a new admin password into the existing config file
    SetPassword {
        /// New password (read from stdin when omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Read a password from stdin and check it against the configured hash
    VerifyPassword,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    notacpanel::init_tracing();

    let config_path = cli.config.unwrap_or_else(config_path_from_env);

    match cli.command.unwrap_or(Commands::Serve {
        port: None,
        bind: None,
    }) {
        Commands::Serve { port, bind } => {
            let mut config = EnvConfig::from_env();
            config.config_path = config_path;
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(bind) = bind {
                config.bind = bind;
            }
            notacpanel::run_server(config).await
        }
        Commands::InitConfig {
            username,
            password,
            server_ip,
            force,
        } => init_config(&config_path, username, password, server_ip, force),
        Commands::SetPassword { password } => set_password(&config_path, password),
        Commands::VerifyPassword => verify(&config_path),
    }
}

fn init_config(
    path: &Path,
    username: String,
    password: Option<String>,
    server_ip: Option<String>,
    force: bool,
) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists, pass --force to overwrite it",
            path.display()
        );
    }
    if username.trim().is_empty() {
        bail!("Username must not be empty");
    }

    let generated = password.is_none();
    let password = password.unwrap_or_else(generate_token);
    if password.is_empty() {
        bail!("Password must not be empty");
    }

    let mut panel = PanelConfig::default();
    panel.server.username = username.trim().to_string();
    if let Some(ip) = server_ip {
        panel.server.ip = ip;
    }
    panel.admin.password_hash = Some(hash_password(&password));
    panel
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    tracing::info!(path = %path.display(), user = %panel.server.username, "Config file written");
    if generated {
        println!("Generated admin password (shown once): {}", password);
    }
    Ok(())
}

fn set_password(path: &Path, password: Option<String>) -> anyhow::Result<()> {
    if !path.exists() {
        bail!(
            "{} does not exist, run `notacpanel init-config` first",
            path.display()
        );
    }
    let mut panel = PanelConfig::load(path)?;

    let password = match password {
        Some(password) => password,
        None => read_stdin_line()?,
    };
    if password.is_empty() {
        bail!("Password must not be empty");
    }

    panel.admin.password_hash = Some(hash_password(&password));
    panel
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    tracing::info!(path = %path.display(), user = %panel.server.username, "Admin password updated");
    println!("Password updated for user '{}'", panel.server.username);
    Ok(())
}

fn verify(path: &Path) -> anyhow::Result<()> {
    let panel = PanelConfig::load(path)?;
    let Some(admin) = panel.admin_credential() else {
        bail!("No admin password_hash configured in {}", path.display());
    };

    let password = read_stdin_line()?;
    if verify_password(&password, &admin.password_hash) {
        println!("Password matches for user '{}'", admin.username);
        Ok(())
    } else {
        bail!("Password does not match for user '{}'", admin.username)
    }
}

/// 读取一行，去掉行尾换行
fn read_stdin_line() -> anyhow::Result<String> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
