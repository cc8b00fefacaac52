use std::{fs, path::Path, time::Duration};

use eyre::{WrapErr, bail};
use serde::Deserialize;

use crate::{
    resolve::Region,
    scanner::{PingMode, ScanPolicy},
};

#[derive(Deserialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// The ngrok region to scan, `us` or `eu`.
    #[serde(default)]
    pub region: Region,

    /// Scan the ngrok hostnames directly instead of resolving them first.
    /// Hostnames that share an address will be scanned more than once.
    #[serde(default)]
    pub skip_resolve: bool,

    /// The number of workers to split the scan between. Each one keeps at
    /// most one connection open.
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Timeout for connecting and for each read, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// The protocol version sent in status handshakes. Defaults to 754
    /// (1.16.5).
    #[serde(default = "default_protocol_version")]
    pub protocol_version: i32,

    #[serde(default)]
    pub ping_mode: PingMode,

    /// Try to detect servers with disabled listings by starting a login. Makes
    /// the scan slower and may result in false positives.
    #[serde(default)]
    pub force_join: bool,

    #[serde(default)]
    pub output: OutputConfig,

    /// Also write debug logs to daily files in this directory.
    #[serde(default)]
    pub logging_dir: Option<String>,
}

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Print discovered servers as one json object per line.
    #[serde(default)]
    pub json: bool,

    /// Discovered servers are also written to this file. An existing file is
    /// overwritten.
    #[serde(default)]
    pub file: Option<String>,

    /// Don't print servers with no online players. Unlisted servers are always
    /// printed since we can't know their player count.
    #[serde(default)]
    pub skip_empty: bool,

    /// Print every endpoint as it's scanned.
    #[serde(default)]
    pub verbose: bool,
}

fn default_threads() -> usize {
    2
}
fn default_timeout_ms() -> u64 {
    1000
}
fn default_protocol_version() -> i32 {
    754
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: Region::default(),
            skip_resolve: false,
            threads: default_threads(),
            timeout_ms: default_timeout_ms(),
            protocol_version: default_protocol_version(),
            ping_mode: PingMode::default(),
            force_join: false,
            output: OutputConfig::default(),
            logging_dir: None,
        }
    }
}

impl Config {
    /// Read and validate the config at `path`.
    pub fn load(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .wrap_err_with(|| format!("couldn't read config at {}", path.display()))?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        if self.threads == 0 {
            bail!("threads must be greater than 0");
        }
        if let Some(file) = &self.output.file
            && Path::new(file).is_dir()
        {
            bail!("output file {file} is a directory");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn scan_policy(&self) -> ScanPolicy {
        ScanPolicy {
            mode: self.ping_mode,
            force_join: self.force_join,
            protocol_version: self.protocol_version,
            timeout: self.timeout(),
        }
    }
}
