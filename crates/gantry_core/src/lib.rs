//! Gantry Core - verification-and-update engine for a self-updating launcher
//!
//! Reads a deployment descriptor, decides whether the local install is
//! current, refreshes stale control files over the network with an atomic
//! backup/rename protocol, validates resources against a digest manifest,
//! and launches the target application as a subprocess.

pub mod app;
pub mod config;
pub mod descriptor;
pub mod digest;
pub mod error;
pub mod fetch;
pub mod launch;
pub mod resource;
pub mod swap;

pub use app::{Application, CONFIG_FILE, VERSION_FILE};
pub use config::ConfigMap;
pub use descriptor::{Descriptor, Rect, UiHints};
pub use digest::{Manifest, DIGEST_FILE};
pub use error::AppError;
pub use fetch::{Fetcher, HttpFetcher};
pub use resource::Resource;
pub use swap::ReplaceStrategy;
