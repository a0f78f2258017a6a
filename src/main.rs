use std::sync::Arc;

use clap::Parser;

use crate::model::config::Config;
use crate::utils::constants::{CONFIG_FILE, CONSTANTS};
use crate::utils::sys_utils::exit;

mod api;
mod model;
mod processing;
mod provider;
mod services;
mod tv_proxy_error;
mod utils;

#[derive(Parser)]
#[command(name = "tv-proxy", version, about = "Live tv streaming proxy for browser based players")]
struct Args {
    /// The config file
    #[arg(short = 'c', long)]
    config: Option<String>,
    /// Overrides the configured log level
    #[arg(short = 'l', long)]
    log_level: Option<String>,
}

fn main() {
    let args = Args::parse();
    let mut cfg = read_config(args.config.as_deref());
    init_logger(args.log_level.as_deref().or(cfg.log.log_level.as_deref()));
    CONSTANTS.sanitize.store(cfg.log.sanitize_sensitive_info, std::sync::atomic::Ordering::Relaxed);
    if let Err(err) = cfg.prepare() {
        exit!("config invalid: {err}");
    }
    log::info!("tv-proxy {} (built {})", env!("CARGO_PKG_VERSION"), option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown"));
    if let Err(err) = api::main_api::start_server(Arc::new(cfg)) {
        exit!("cant start server: {err}");
    }
}

fn read_config(config_file: Option<&str>) -> Config {
    let path = config_file.unwrap_or(CONFIG_FILE);
    if config_file.is_none() && !std::path::Path::new(path).exists() {
        // no config given and none found next to the binary, defaults apply
        return Config::default();
    }
    match std::fs::File::open(path) {
        Ok(file) => match serde_yaml::from_reader(file) {
            Ok(cfg) => cfg,
            Err(err) => {
                eprintln!("cant read config file {path}: {err}");
                std::process::exit(1);
            }
        },
        Err(err) => {
            eprintln!("cant open config file {path}: {err}");
            std::process::exit(1);
        }
    }
}

fn init_logger(log_level: Option<&str>) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(level) = log_level {
        builder.parse_filters(level);
    }
    builder.init();
}
