//! Ultimate PVR - command-line inspector
//! Drives the PVR client against the configured backend and prints what the
//! host would see.

// Use mimalloc for faster memory allocation (Linux, macOS)
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::process::ExitCode;

use tracing::error;

use ultimate_pvr::epg::{self, DEFAULT_GUIDE_HOURS};
use ultimate_pvr::{AppConfig, HostInfo, PvrClient};

const USAGE: &str = "usage: ultimate-pvr <providers | channels [radio] | stream <uid> | epg <uid> [hours] | status>";

fn parse_arg<T: std::str::FromStr>(arg: Option<&String>, what: &str) -> Result<T, String> {
    let raw = arg.ok_or_else(|| format!("missing {}\n{}", what, USAGE))?;
    raw.parse()
        .map_err(|_| format!("invalid {}: {}", what, raw))
}

fn run(client: &mut PvrClient, args: &[String]) -> Result<(), String> {
    let command = args.first().map(String::as_str).unwrap_or("status");

    match command {
        "status" => {
            let status = client.signal_status();
            println!("{} - {}", client.backend_name(), client.backend_version());
            println!("Backend:   {}", client.connection_string());
            println!("Adapter:   {} ({})", status.adapter_name, status.adapter_status);
            println!("Providers: {}", client.providers_amount());
            println!("Channels:  {}", client.channels_amount());
        }
        "providers" => {
            for p in client.providers() {
                println!("{:>11}  {:<24} {}", p.unique_id, p.name, p.countries.join(","));
            }
        }
        "channels" => {
            let radio = args.get(1).is_some_and(|a| a == "radio");
            for c in client.channels(radio) {
                println!(
                    "{:>6}  {:<32} {}",
                    c.channel_number,
                    c.channel_name,
                    if c.has_archive { "catch-up" } else { "" }
                );
            }
        }
        "stream" => {
            let uid: i32 = parse_arg(args.get(1), "channel uid")?;
            let properties = client
                .channel_stream_properties(uid)
                .map_err(|e| format!("{} ({:?})", e, e.status()))?;
            for p in properties {
                println!("{}={}", p.name, p.value);
            }
        }
        "epg" => {
            let uid: i32 = parse_arg(args.get(1), "channel uid")?;
            let hours: i64 = match args.get(2) {
                Some(_) => parse_arg(args.get(2), "hours")?,
                None => DEFAULT_GUIDE_HOURS,
            };
            let start = epg::current_timestamp();
            let entries = client
                .epg_for_channel(uid, start, start + hours * 3600)
                .map_err(|e| e.to_string())?;
            for entry in entries {
                println!(
                    "{}  {:<40} {}",
                    epg::format_datetime(entry.start),
                    entry.title,
                    if client.is_epg_tag_playable(&entry) { "playable" } else { "" }
                );
            }
        }
        other => return Err(format!("unknown command: {}\n{}", other, USAGE)),
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::load();
    let host = HostInfo {
        major: config.host_version_major,
        minor: 0,
        revision: env!("CARGO_PKG_VERSION").to_string(),
    };

    let mut client = PvrClient::new(config, &host);
    if !client.start() {
        error!("Backend not reachable at {}", client.connection_string());
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&mut client, &args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{}", message);
            ExitCode::FAILURE
        }
    }
}
