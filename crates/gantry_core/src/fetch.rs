//! Network transfer of remote files to local disk.
//!
//! The engine never speaks HTTP itself; it hands every transfer to a
//! [`Fetcher`]. The default implementation is a blocking reqwest client, and
//! tests substitute stub fetchers.

use std::fs::{self, File};
use std::io;
use std::path::Path;
use tracing::debug;

/// Byte-level transfer of a remote location to a local file.
pub trait Fetcher {
    /// Stream `url` into `dest`, creating parent directories as needed.
    fn fetch(&self, url: &str, dest: &Path) -> io::Result<()>;
}

/// Blocking HTTP fetcher.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> HttpFetcher {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("gantry/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        HttpFetcher { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> io::Result<()> {
        debug!("GET {} -> {}", url, dest.display());
        let mut resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        if !resp.status().is_success() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("GET {} returned {}", url, resp.status()),
            ));
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(dest)?;
        io::copy(&mut resp, &mut file)?;
        Ok(())
    }
}
