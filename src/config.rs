//! Server configuration.
//!
//! Values come from an optional JSON file and are then overridden by command line flags in
//! `kvcache-server`. Every field has a default, so a file only needs the fields it changes.
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{KvsError, Result};

/// the thread pool implementations a server can run on
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolKind {
    /// [`SharedQueueThreadPool`](crate::SharedQueueThreadPool)
    Shared,
    /// [`RayonThreadPool`](crate::RayonThreadPool)
    Rayon,
}

impl FromStr for PoolKind {
    type Err = KvsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "shared" => Ok(PoolKind::Shared),
            "rayon" => Ok(PoolKind::Rayon),
            other => Err(KvsError::Parsing(format!(
                "unknown thread pool {}, expected 'shared' or 'rayon'",
                other
            ))),
        }
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolKind::Shared => f.write_str("shared"),
            PoolKind::Rayon => f.write_str("rayon"),
        }
    }
}

/// Settings for `kvcache-server`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// IP:PORT to listen on
    pub addr: String,
    /// number of cache sets
    pub num_sets: usize,
    /// entries per cache set
    pub set_capacity: usize,
    /// worker threads servicing connections
    pub threads: u32,
    /// which thread pool to use
    pub pool: PoolKind,
    /// store snapshot restored at startup and rewritten periodically
    pub snapshot: Option<PathBuf>,
    /// seconds between two snapshots
    pub snapshot_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            addr: "127.0.0.1:4000".to_string(),
            num_sets: 100,
            set_capacity: 10,
            threads: 4,
            pool: PoolKind::Shared,
            snapshot: None,
            snapshot_interval_secs: 30,
        }
    }
}

impl ServerConfig {
    /// loads a configuration from a JSON file. Missing fields take their default value
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| {
            KvsError::Parsing(format!("could not parse config file {:?}: {}", path, e))
        })
    }

    /// checks that the configuration can be used to start a server and returns the parsed
    /// listen address
    ///
    /// # Errors
    /// returns [`KvsError::Parsing`] describing the first invalid setting
    pub fn validate(&self) -> Result<SocketAddr> {
        let addr: SocketAddr = self.addr.parse().map_err(|_| {
            KvsError::Parsing(format!("could not parse {} into an IP address and port", self.addr))
        })?;
        if self.num_sets == 0 {
            return Err(KvsError::Parsing("num_sets must be at least 1".to_string()));
        }
        if self.set_capacity == 0 {
            return Err(KvsError::Parsing("set_capacity must be at least 1".to_string()));
        }
        if self.threads == 0 {
            return Err(KvsError::Parsing("threads must be at least 1".to_string()));
        }
        if self.snapshot.is_some() && self.snapshot_interval_secs == 0 {
            return Err(KvsError::Parsing(
                "snapshot_interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(addr)
    }
}
