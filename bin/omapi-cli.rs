//! `omapi-cli` - a command-line client for the ISC DHCP Object Management
//! API, in the spirit of `omshell`.
//!
//! # Usage
//!
//! ```bash
//! omapi-cli --host 127.0.0.1 --port 7911 --user alice --key a2V5 \
//!     add-host --ip 192.0.2.10 --mac 00:11:22:33:44:55
//! ```

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use omapi::Client;

/// ISC DHCP OMAPI command-line client
#[derive(Parser, Debug)]
#[command(name = "omapi-cli")]
#[command(about = "Query and edit DHCP host entries over OMAPI")]
#[command(version)]
struct Args {
    /// OMAPI server host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// OMAPI server port
    #[arg(long, default_value_t = 7911)]
    port: u16,

    /// OMAPI key name, for HMAC-MD5 authentication
    #[arg(long)]
    user: Option<String>,

    /// Base64-encoded OMAPI key secret, for HMAC-MD5 authentication
    #[arg(long)]
    key: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a host entry binding a MAC address to an IP address.
    AddHost {
        /// IPv4 address to assign, dotted-quad.
        #[arg(long)]
        ip: String,
        /// Hardware address, colon-hex.
        #[arg(long)]
        mac: String,
    },
    /// Update the IP address of an existing host entry, creating it if
    /// absent.
    UpdateHost {
        /// Hardware address of the host to update, colon-hex.
        #[arg(long)]
        mac: String,
        /// New IPv4 address, dotted-quad.
        #[arg(long)]
        ip: String,
    },
    /// Delete a host entry by MAC address.
    DelHost {
        /// Hardware address, colon-hex.
        #[arg(long)]
        mac: String,
    },
    /// Look up a host's IP address by its MAC address.
    LookupIp {
        /// Hardware address, colon-hex.
        #[arg(long)]
        mac: String,
    },
    /// Look up a host's MAC address by its IP address.
    LookupMac {
        /// IPv4 address, dotted-quad.
        #[arg(long)]
        ip: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!(host = %args.host, port = args.port, "connecting to omapi server");
    let mut client = Client::connect(
        &args.host,
        args.port,
        args.user.as_deref(),
        args.key.as_deref(),
    )?;

    match args.command {
        Command::AddHost { ip, mac } => {
            client.add_host(&ip, &mac)?;
            println!("added host {mac} -> {ip}");
        }
        Command::UpdateHost { mac, ip } => {
            client.update_host(&mac, &ip)?;
            println!("updated host {mac} -> {ip}");
        }
        Command::DelHost { mac } => {
            client.del_host(&mac)?;
            println!("deleted host {mac}");
        }
        Command::LookupIp { mac } => {
            let ip = client.lookup_ip(&mac)?;
            println!("{ip}");
        }
        Command::LookupMac { ip } => {
            let mac = client.lookup_mac(&ip)?;
            println!("{mac}");
        }
    }

    client.close();
    Ok(())
}
