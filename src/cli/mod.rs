pub mod commands;

use crate::codec::registry;
use crate::config::{Config, ConfigOverrides};
use crate::output::{self, OutputFormatter};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "request-editor-cli")]
#[command(version, about = "Capture, edit, and replay top-level HTTP requests")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<commands::Command>,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Run Chrome in headless mode")]
    pub headless: Option<bool>,

    #[arg(long, global = true, help = "Chrome debugging port")]
    pub port: Option<u16>,

    #[arg(long, global = true, help = "Path to Chrome executable")]
    pub chrome_path: Option<PathBuf>,

    #[arg(long, global = true, help = "Control socket path")]
    pub socket: Option<PathBuf>,
}

pub async fn run() -> crate::Result<()> {
    let cli = Cli::parse();

    let config = if let Some(config_path) = &cli.config {
        let content = std::fs::read_to_string(config_path)?;
        toml::from_str(&content)?
    } else {
        Config::load()?
    };

    let overrides = ConfigOverrides {
        headless: cli.headless,
        port: cli.port,
        chrome_path: cli.chrome_path.clone(),
        socket: cli.socket.clone(),
    };

    let config = Arc::new(config.load_with_overrides(overrides));
    config.validate()?;

    match cli.command.unwrap_or(commands::Command::Serve) {
        commands::Command::Serve => crate::server::daemon::run(config).await,
        commands::Command::Codecs => {
            output::print_output(&CodecList::current(), cli.json)
        }
        commands::Command::Config => {
            println!("{}", config.show());
            Ok(())
        }
    }
}

#[derive(Debug, Serialize)]
struct CodecEntry {
    name: &'static str,
    wire_type: &'static str,
    default: bool,
}

#[derive(Debug, Serialize)]
struct CodecList {
    codecs: Vec<CodecEntry>,
}

impl CodecList {
    fn current() -> Self {
        Self {
            codecs: registry()
                .codecs()
                .iter()
                .map(|c| CodecEntry {
                    name: c.name(),
                    wire_type: c.wire_type(),
                    default: c.is_default(),
                })
                .collect(),
        }
    }
}

impl OutputFormatter for CodecList {
    fn format_text(&self) -> String {
        use crate::output::text;
        self.codecs
            .iter()
            .map(|c| {
                let marker = if c.default { " (default)" } else { "" };
                text::bullet(&format!("{} -> {}{}", c.name, c.wire_type, marker))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn format_json(&self, pretty: bool) -> crate::Result<String> {
        output::to_json(self, pretty)
    }
}
