//! lantern-publish — CGI endpoint through which the owner edits the
//! published service catalog.
//!
//! GET serves the UI page with the current catalog; POST replaces the
//! catalog with the submitted one and commits. Exit code is zero except
//! for fatal setup failures and the one expected validation failure the
//! caller must notice: a catalog that no longer fits in the SSID.

use std::io::Read;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

use lantern_core::config::SsidBackend;
use lantern_core::LanternConfig;
use lantern_publish::form::{self, ServiceScanner, POST_KEY};
use lantern_publish::page;
use lantern_store::{
    CategoryStore, FileSsid, Service, ServiceList, SsidBinding, StoreError, WirelessSsid,
};

const SSID_TOO_LONG_MSG: &str = "Services do not fit into the SSID (try to reduce the \
                                 character count of the descriptions or the number of services)";

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            // Setup failed before any HTML went out; stderr reaches the
            // web server's error log.
            eprintln!("lantern-publish: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let config = LanternConfig::load().context("cannot load configuration")?;

    // Stdout is the HTTP response, so logs go to a file.
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.publish.log_path)
        .with_context(|| format!("cannot open log file {}", config.publish.log_path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .init();

    let method = std::env::var("REQUEST_METHOD").context("REQUEST_METHOD is not set")?;
    let ui = std::fs::read_to_string(&config.publish.ui_path).with_context(|| {
        format!("cannot read UI file {}", config.publish.ui_path.display())
    })?;

    // From here on the reply is a rendered page and errors are shown in it.
    print!("Content-type: text/html\n\n{ui}");

    let (mut error, code) = match method.as_str() {
        "GET" => (None, ExitCode::SUCCESS),
        "POST" => handle_post(&config),
        other => {
            tracing::warn!(method = other, "rejected request method");
            (
                Some("Invalid request method (not GET nor POST)".to_string()),
                ExitCode::SUCCESS,
            )
        }
    };

    // The page always closes over the currently published state, even
    // after a failed save.
    let services = match read_services(&config) {
        Ok(services) => services,
        Err(e) => {
            tracing::error!(error = %e, "cannot read the service list");
            error = error.or_else(|| Some("Cannot load service list for reading".to_string()));
            Vec::new()
        }
    };
    let categories = match CategoryStore::open(&config.publish.category_db_path)
        .and_then(|store| store.all())
    {
        Ok(categories) => categories,
        Err(e) => {
            tracing::warn!(error = %e, "cannot read the category list");
            Vec::new()
        }
    };

    print!(
        "{}",
        page::script_block(&categories, &services, error.as_deref())
    );
    Ok(code)
}

/// Replaces the catalog from the POST body. Returns the error message to
/// show (if any) and the process exit code.
fn handle_post(config: &LanternConfig) -> (Option<String>, ExitCode) {
    let body = match read_post_body() {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "cannot read POST data");
            return (
                Some("POST data cannot be read".to_string()),
                ExitCode::SUCCESS,
            );
        }
    };

    let Some(stream) = body.strip_prefix(POST_KEY) else {
        return (Some("Invalid POST data".to_string()), ExitCode::SUCCESS);
    };
    let decoded = form::url_decode(stream);

    let drafts = match ServiceScanner::new(&decoded).and_then(ServiceScanner::collect_services) {
        Ok(drafts) => drafts,
        Err(e) => {
            tracing::warn!(error = %e, "malformed service stream");
            return (
                Some("Cannot parse the submitted services".to_string()),
                ExitCode::SUCCESS,
            );
        }
    };

    let mut list = match open_list(config) {
        Ok(list) => list,
        Err(e) => {
            tracing::error!(error = %e, "cannot open the service list");
            return (
                Some("Cannot load service list for writing".to_string()),
                ExitCode::SUCCESS,
            );
        }
    };

    match form::replace_catalog(&mut list, &drafts) {
        Ok(()) => {
            tracing::info!(count = drafts.len(), "service catalog replaced");
            (None, ExitCode::SUCCESS)
        }
        // The one expected validation failure: report it verbatim and make
        // the process exit status reflect it.
        Err(StoreError::SsidTooLong) => {
            (Some(SSID_TOO_LONG_MSG.to_string()), ExitCode::FAILURE)
        }
        Err(e) => {
            tracing::error!(error = %e, "commit failed");
            (
                Some("Error in saving the service list".to_string()),
                ExitCode::SUCCESS,
            )
        }
    }
}

fn read_post_body() -> Result<Vec<u8>> {
    let length: usize = std::env::var("CONTENT_LENGTH")
        .context("CONTENT_LENGTH is not set")?
        .trim()
        .parse()
        .context("CONTENT_LENGTH is not a number")?;
    let mut body = vec![0u8; length];
    std::io::stdin()
        .read_exact(&mut body)
        .context("cannot read the POST body")?;
    Ok(body)
}

fn open_list(config: &LanternConfig) -> Result<ServiceList, StoreError> {
    let ssid: Arc<dyn SsidBinding> = match config.ssid.backend {
        SsidBackend::Wireless => Arc::new(WirelessSsid::new(&config.ssid.interface)),
        SsidBackend::File => Arc::new(FileSsid::new(&config.ssid.file_path)),
    };
    ServiceList::open(&config.store.db_path, ssid)
}

fn read_services(config: &LanternConfig) -> Result<Vec<Service>, StoreError> {
    let mut list = open_list(config)?;
    let mut services = Vec::new();
    let mut pos = 0;
    while let Some(service) = list.get(pos)? {
        services.push(service);
        pos += 1;
    }
    Ok(services)
}
