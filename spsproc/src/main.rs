//! SpacePython Procedure Runner
//!
//! Loads the catalog, registers the sample procedures and runs the one
//! named on the command line:
//!
//! ```text
//! spsproc <procedure> [NAME=VALUE ...]
//! ```

mod procedures;

use log::{error, info};
use std::collections::BTreeMap;
use std::env;
use std::process;
use std::sync::Arc;

use spslib::config::constants::CONFIG_ENV_VAR;
use spslib::{load_config, CancelToken, Catalog, EnvironmentConfig, LogTransport, ProcedureEnvironment};

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut args = env::args().skip(1);
    let name = match args.next() {
        Some(name) => name,
        None => {
            error!("Usage: spsproc <procedure> [NAME=VALUE ...]");
            process::exit(1);
        }
    };
    let supplied = match parse_assignments(args) {
        Ok(supplied) => supplied,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    let config = match env::var_os(CONFIG_ENV_VAR) {
        Some(path) => match load_config(&path) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load configuration {:?}: {}", path, e);
                process::exit(1);
            }
        },
        None => EnvironmentConfig::default(),
    };

    // The process cannot run anything without a catalog
    let catalog = match Catalog::load(config.catalog_path.as_deref(), Arc::new(LogTransport)) {
        Ok(catalog) => catalog,
        Err(e) => {
            error!("Failed to load catalog: {}", e);
            process::exit(1);
        }
    };

    let environment = ProcedureEnvironment::new(Arc::new(catalog), &config);
    procedures::register_all(&environment);
    ctrlc_handler(environment.cancel_token());

    match environment.run(&name, &supplied) {
        Ok(status) => {
            info!("{} returned {:?}", name, status);
            process::exit(status.code());
        }
        Err(e) => {
            error!("{} failed: {}", name, e);
            process::exit(1);
        }
    }
}

/// Split `NAME=VALUE` arguments
fn parse_assignments<I>(args: I) -> Result<BTreeMap<String, String>, String>
where
    I: IntoIterator<Item = String>,
{
    let mut assignments = BTreeMap::new();
    for arg in args {
        match arg.split_once('=') {
            Some((name, value)) if !name.is_empty() => {
                assignments.insert(name.to_string(), value.to_string());
            }
            _ => return Err(format!("Expected NAME=VALUE, found '{}'", arg)),
        }
    }
    Ok(assignments)
}

/// Set up Ctrl+C handler to cancel pending waits
fn ctrlc_handler(cancel: CancelToken) {
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received interrupt, cancelling waits");
        cancel.cancel();
    }) {
        error!("Failed to set Ctrl+C handler: {}", e);
    }
}
