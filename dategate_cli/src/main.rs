mod cli_options;

use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, Level};

use common::config::{read_config, ProxyConfig};
use common::log::query_log::QueryLog;
use common::log::tracing_factory::{TracingFactory, TracingFactoryOptions};
use pipeline::CoreContext;
use proxy::ProxyServer;

use crate::cli_options::CliArgs;

fn main() {
    let args = CliArgs::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration Error: {e}");
            process::exit(1);
        }
    };

    init_logging(&args, &config);

    info!("dategate - MySQL protocol proxy");
    log_summary(&config);

    let executor = match connection::create_executor(&config) {
        Ok(executor) => executor,
        Err(e) => {
            error!("backend setup failed: {e}");
            process::exit(1);
        }
    };

    // fail fast when the backend is unreachable; SHOW TABLES is the one
    // probe the constrained backend is known to accept
    info!("testing backend connection");
    if let Err(e) = executor.execute("SHOW TABLES") {
        error!("backend connection test failed: {e}");
        process::exit(1);
    }
    info!("backend connection successful");

    let ctx = CoreContext::new(Arc::new(config), Arc::new(QueryLog::new()));
    let server = ProxyServer::new(ctx.clone(), executor);

    if let Err(e) = server.run() {
        ctx.query_log.log_metrics();
        error!("fatal server error: {e}");
        process::exit(1);
    }
}

fn load_config(args: &CliArgs) -> common::err::PResult<ProxyConfig> {
    match args.config_path() {
        Some(path) => {
            eprintln!("loading config: {}", path.display());
            read_config(path)
        }
        None => {
            eprintln!("no config file found, using built-in defaults");
            Ok(ProxyConfig::default())
        }
    }
}

fn init_logging(args: &CliArgs, config: &ProxyConfig) {
    let mut options = TracingFactoryOptions::new(args.debug, config.base.log_dir.clone());
    if let Some(level) = args.log_level.as_deref().and_then(parse_level) {
        options = options.with_level(level);
    }
    TracingFactory::init_log_with_options(options);
}

fn parse_level(level: &str) -> Option<Level> {
    match level.to_ascii_uppercase().as_str() {
        "TRACE" => Some(Level::TRACE),
        "DEBUG" => Some(Level::DEBUG),
        "INFO" => Some(Level::INFO),
        "WARN" | "WARNING" => Some(Level::WARN),
        "ERROR" => Some(Level::ERROR),
        _ => None,
    }
}

fn log_summary(config: &ProxyConfig) {
    info!(
        host = %config.proxy.host,
        port = config.proxy.port,
        "proxy endpoint"
    );
    info!(
        connection_type = %config.backend.connection_type,
        pool_size = config.backend.pool_size,
        pre_ping = config.backend.pool_pre_ping,
        "backend"
    );
    info!(
        block_writes = config.security.block_writes,
        require_date_filter = config.business_rules.require_date_filter,
        unwrap_subqueries = config.transformations.unwrap_subqueries,
        auto_fix_group_by = config.transformations.auto_fix_group_by,
        "policies"
    );
}
