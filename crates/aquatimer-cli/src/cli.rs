//! Command-line interface definitions and parsing

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "Bridge an Aqua Systems tap timer to MQTT", long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Advertised name of the timer
    #[arg(long, alias = "device_id")]
    pub device_id: Option<String>,

    /// Broker URL, e.g. mqtt://192.168.1.10:1883
    #[arg(long, alias = "broker_url")]
    pub broker_url: Option<String>,

    /// Print an example configuration file and exit
    #[arg(long)]
    pub print_config: bool,
}
