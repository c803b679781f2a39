use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the capture/edit/replay daemon
    Serve,
    /// List the registered body codecs
    Codecs,
    /// Show the effective configuration
    Config,
}
