use std::{
    fs::File,
    io::{BufWriter, Write},
    sync::atomic::{AtomicUsize, Ordering},
};

use eyre::WrapErr;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::warn;

use crate::{
    config::OutputConfig,
    scanner::{ScanCallback, response::PingResponse},
    terminal_colors::*,
};

/// How often a progress line is printed, in scanned endpoints.
const PROGRESS_EVERY: usize = 100;

/// Prints discovered servers, optionally saves them to a file, and keeps
/// track of progress.
pub struct Reporter {
    output: OutputConfig,
    total: usize,
    scanned: AtomicUsize,
    discovered: AtomicUsize,
    file: Option<Mutex<BufWriter<File>>>,
}

impl Reporter {
    /// `total` is the number of endpoints in the scan, only used for
    /// progress messages.
    pub fn new(output: &OutputConfig, total: usize) -> eyre::Result<Self> {
        let file = match &output.file {
            Some(path) => {
                let file = File::create(path)
                    .wrap_err_with(|| format!("couldn't open output file {path}"))?;
                Some(Mutex::new(BufWriter::new(file)))
            }
            None => None,
        };
        Ok(Self {
            output: output.clone(),
            total,
            scanned: AtomicUsize::new(0),
            discovered: AtomicUsize::new(0),
            file,
        })
    }

    pub fn scanned_count(&self) -> usize {
        self.scanned.load(Ordering::Relaxed)
    }

    /// Servers that were printed, so skipped empty servers don't count.
    pub fn discovered_count(&self) -> usize {
        self.discovered.load(Ordering::Relaxed)
    }

    /// The text for a discovered server, or `None` if it should be skipped.
    pub fn render(&self, response: &PingResponse, host: &str, port: u16) -> Option<String> {
        if self.output.skip_empty && !response.is_unlisted() && response.online_players() == 0 {
            return None;
        }
        Some(if self.output.json {
            format_json(response, host, port)
        } else {
            format_text(response, host, port)
        })
    }

    fn write_to_file(&self, text: &str) {
        let Some(file) = &self.file else {
            return;
        };
        let mut file = file.lock();
        if let Err(err) = writeln!(file, "{text}").and_then(|()| file.flush()) {
            warn!("failed to write to output file: {err}");
        }
    }
}

impl ScanCallback for Reporter {
    fn discovered(&self, response: &PingResponse, host: &str, port: u16) {
        let Some(text) = self.render(response, host, port) else {
            return;
        };
        self.discovered.fetch_add(1, Ordering::Relaxed);
        println!("{text}");
        self.write_to_file(&text);
    }

    fn scanned(&self, host: &str, port: u16) {
        let scanned = self.scanned.fetch_add(1, Ordering::Relaxed) + 1;
        if scanned % PROGRESS_EVERY == 0 {
            eprintln!("{GRAY}Scanning... ({scanned}/{}){RESET}", self.total);
        }
        if self.output.verbose {
            eprintln!("{GRAY}{ITALIC}Scanned {host}:{port}{RESET}");
        }
    }
}

pub fn format_text(response: &PingResponse, host: &str, port: u16) -> String {
    let mut text = format!(
        "--- Discovered a Minecraft server\nAddress: {host}:{port}\nVersion: {}\nProtocol: {}\nPlayers: {}/{}\n",
        response.version(),
        response.protocol_version(),
        response.online_players(),
        response.max_players(),
    );
    if response.is_legacy() {
        text.push_str("LEGACY\n");
    }
    if response.is_unlisted() {
        text.push_str("UNLISTED\n");
    }
    match response.description_plaintext() {
        Some(description) => text.push_str(&description),
        None => text.push_str("No description"),
    }
    text.push_str("\n---");
    text
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DiscoveredServerJson<'a> {
    version: &'a str,
    protocol: i32,
    players: i32,
    max_players: i32,
    is_legacy: bool,
    is_unlisted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    host: &'a str,
    port: u16,
}

/// A single line of json.
pub fn format_json(response: &PingResponse, host: &str, port: u16) -> String {
    let json = DiscoveredServerJson {
        version: response.version(),
        protocol: response.protocol_version(),
        players: response.online_players(),
        max_players: response.max_players(),
        is_legacy: response.is_legacy(),
        is_unlisted: response.is_unlisted(),
        description: response.description_plaintext(),
        host,
        port,
    };
    // only strings and numbers, can't fail
    serde_json::to_string(&json).unwrap_or_default()
}
