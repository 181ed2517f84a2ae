//! Command line session arguments and config resolution.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use borderlink_core::{Config, Role};
use clap::Args;

/// Settings shared by every command. Each one overrides the config file.
#[derive(Args, Debug, Default, Clone)]
pub struct SessionArgs {
    /// Which half of the grid this peer owns (left or right)
    #[arg(long)]
    pub role: Option<Role>,

    /// Local address to listen on
    #[arg(long)]
    pub local: Option<IpAddr>,

    /// Partner's address
    #[arg(long)]
    pub remote: Option<IpAddr>,

    /// Grid width in cells, ghost columns included
    #[arg(long)]
    pub width: Option<usize>,

    /// Grid height in cells
    #[arg(long)]
    pub height: Option<usize>,

    /// Port to listen on for the partner's stream
    #[arg(long)]
    pub listen_port: Option<u16>,

    /// Port the partner listens on
    #[arg(long)]
    pub peer_port: Option<u16>,

    /// Source port for the outbound stream (0 lets the OS pick)
    #[arg(long)]
    pub send_port: Option<u16>,

    /// Connection attempts before giving up
    #[arg(long)]
    pub connect_attempts: Option<u32>,

    /// Delay between connection attempts, in milliseconds
    #[arg(long)]
    pub connect_interval_ms: Option<u64>,

    /// How long to wait for the partner's handshake, in milliseconds
    #[arg(long)]
    pub handshake_timeout_ms: Option<u64>,

    /// How long to wait for any steady-state frame, in milliseconds
    #[arg(long)]
    pub read_timeout_ms: Option<u64>,

    /// Stop after this many steps
    #[arg(long)]
    pub steps: Option<u64>,
}

/// Arguments for `borderlink run`
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Seed for the initial grid (defaults to one per role)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write per-phase average timings here when the run ends
    #[arg(long)]
    pub stats_file: Option<PathBuf>,
}

impl SessionArgs {
    /// Merge the config file (explicit, or the default location if present)
    /// with command line overrides.
    pub fn resolve(&self, config_path: Option<&Path>) -> anyhow::Result<Config> {
        let base = match config_path {
            Some(path) => Some(
                Config::from_file(path)
                    .with_context(|| format!("failed to load config from {}", path.display()))?,
            ),
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Some(
                    Config::from_file(&path)
                        .with_context(|| format!("failed to load config from {}", path.display()))?,
                ),
                None => None,
            },
        };

        let config = self.apply(base)?;
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, base: Option<Config>) -> anyhow::Result<Config> {
        let mut config = match base {
            Some(config) => config,
            None => {
                let (Some(role), Some(local), Some(remote)) = (self.role, self.local, self.remote) else {
                    bail!("--role, --local and --remote are required without a config file");
                };
                Config::new(role, local, remote)
            }
        };

        if let Some(role) = self.role {
            config.role = role;
        }
        if let Some(local) = self.local {
            config.local_addr = local;
        }
        if let Some(remote) = self.remote {
            config.remote_addr = remote;
        }
        if let Some(width) = self.width {
            config.grid_width = width;
        }
        if let Some(height) = self.height {
            config.grid_height = height;
        }
        if let Some(port) = self.listen_port {
            config.listen_port = port;
        }
        if let Some(port) = self.peer_port {
            config.peer_port = port;
        }
        if let Some(port) = self.send_port {
            config.send_port = port;
        }
        if let Some(attempts) = self.connect_attempts {
            config.connect_attempts = attempts;
        }
        if let Some(ms) = self.connect_interval_ms {
            config.connect_interval_ms = ms;
        }
        if let Some(ms) = self.handshake_timeout_ms {
            config.handshake_timeout_ms = ms;
        }
        if let Some(ms) = self.read_timeout_ms {
            config.read_timeout_ms = ms;
        }
        if self.steps.is_some() {
            config.max_steps = self.steps;
        }

        Ok(config)
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("borderlink").join("config.json"))
}
