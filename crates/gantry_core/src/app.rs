//! Application orchestration: the verify-and-update state machine.
//!
//! The descriptor and the digest manifest are each other's root of trust
//! (the manifest records the descriptor's digest, the descriptor names the
//! location the manifest is fetched from), so metadata verification starts
//! from "both may be stale" and converges with at most one recovery
//! download per control file per call.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Child;
use tracing::{info, warn};

use crate::config::ConfigMap;
use crate::descriptor::{Descriptor, UiHints, UNVERSIONED};
use crate::digest::{Manifest, DIGEST_FILE};
use crate::error::AppError;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::launch;
use crate::resource::Resource;
use crate::swap::{ReplaceStrategy, NEW_SUFFIX, OLD_SUFFIX};

/// Name of the deployment descriptor control file.
pub const CONFIG_FILE: &str = "gantry.txt";

/// Name of the target version marker file.
pub const VERSION_FILE: &str = "version.txt";

/// One application installation and the machinery to verify, update and
/// launch it. Exactly one instance may operate on an install directory at a
/// time.
pub struct Application {
    appdir: PathBuf,
    fetcher: Box<dyn Fetcher>,
    replace: ReplaceStrategy,
    desc: Descriptor,
    digest: Option<Manifest>,
    target_version: i64,
}

impl Application {
    /// Create an application over an install directory, using the blocking
    /// HTTP fetcher and the platform's replace strategy.
    pub fn new(appdir: impl Into<PathBuf>) -> Application {
        Self::with_fetcher(appdir, Box::new(HttpFetcher::new()))
    }

    /// Create an application with a caller-supplied fetcher.
    pub fn with_fetcher(appdir: impl Into<PathBuf>, fetcher: Box<dyn Fetcher>) -> Application {
        Application {
            appdir: appdir.into(),
            fetcher,
            replace: ReplaceStrategy::for_platform(),
            desc: Descriptor::default(),
            digest: None,
            target_version: UNVERSIONED,
        }
    }

    /// Override the control-file replace strategy.
    pub fn set_replace_strategy(&mut self, replace: ReplaceStrategy) {
        self.replace = replace;
    }

    pub fn appdir(&self) -> &Path {
        &self.appdir
    }

    /// The parsed deployment descriptor. Empty until `init` has succeeded.
    pub fn descriptor(&self) -> &Descriptor {
        &self.desc
    }

    /// The loaded digest manifest, if metadata verification got that far.
    pub fn manifest(&self) -> Option<&Manifest> {
        self.digest.as_ref()
    }

    /// Target version from the last metadata verification.
    pub fn target_version(&self) -> i64 {
        self.target_version
    }

    /// Local path of a file inside the install directory.
    pub fn local_path(&self, name: &str) -> PathBuf {
        self.appdir.join(name)
    }

    /// Versioned remote URL for a relative path. Requires a previously
    /// parsed application base.
    pub fn remote_url(&self, path: &str) -> io::Result<String> {
        if self.desc.vappbase.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "application base has not been parsed",
            ));
        }
        Ok(format!("{}{}", self.desc.vappbase, path))
    }

    /// A resource referring to the descriptor file itself.
    pub fn config_resource(&self) -> Result<Resource, AppError> {
        Resource::new(CONFIG_FILE, &self.desc.vappbase, &self.appdir)
            .map_err(|e| AppError::Internal(format!("config resource: {}", e)))
    }

    /// Parse the deployment descriptor and prepare for operation. Safe to
    /// call repeatedly; the descriptor is replaced wholesale each time.
    ///
    /// Returns UI hints so the caller can configure a progress display
    /// before the heavier verification work runs.
    pub fn init(&mut self) -> Result<UiHints, AppError> {
        let config_path = self.local_path(CONFIG_FILE);
        let cdata = match ConfigMap::parse_file(&config_path) {
            Ok(cdata) => cdata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // a prior update may have died between the two renames;
                // the backup copy is an acceptable source
                let backup = self.local_path(&format!("{}{}", CONFIG_FILE, OLD_SUFFIX));
                if backup.exists() {
                    ConfigMap::parse_file(&backup)?
                } else {
                    return Err(AppError::Io(e));
                }
            }
            Err(e) => return Err(AppError::Io(e)),
        };

        // phase one first: recovery needs a usable base even if the rest
        // of the descriptor turns out to be unusable
        let base = Descriptor::parse_base(&cdata)?;
        self.desc = Descriptor::from_base(base.clone());

        let (desc, rejected) = Descriptor::parse_rest(&cdata, base, &self.appdir)?;
        for entry in &rejected {
            warn!(
                "Ignoring invalid {} entry '{}': {}",
                entry.key, entry.value, entry.reason
            );
        }
        self.desc = desc;

        Ok(UiHints::parse(&cdata))
    }

    /// Re-download the descriptor using base information parsed by a
    /// previous successful `init`.
    pub fn attempt_recovery(&self) -> Result<(), AppError> {
        self.download_control_file(CONFIG_FILE)
    }

    /// Download a fresh copy of the named control file and swap it over the
    /// original. The original is untouched until the new copy is fully on
    /// disk.
    pub fn download_control_file(&self, name: &str) -> Result<(), AppError> {
        let url = self
            .remote_url(name)
            .map_err(|e| AppError::ControlFileDownload {
                path: name.to_string(),
                source: e,
            })?;
        let target = self.local_path(&format!("{}{}", name, NEW_SUFFIX));

        info!("Refetching '{}' from '{}'", name, url);
        self.fetcher
            .fetch(&url, &target)
            .map_err(|e| AppError::ControlFileDownload {
                path: name.to_string(),
                source: e,
            })?;

        self.replace
            .replace(&self.appdir, name)
            .map_err(|e| AppError::ControlFileDownload {
                path: name.to_string(),
                source: e,
            })
    }

    /// Load the digest manifest, verify the descriptor against it
    /// (recovering each with at most one re-download), then read the target
    /// version marker.
    ///
    /// Returns true when the installed version has fallen behind the target
    /// and the caller must fetch a newer deployment before proceeding.
    pub fn verify_metadata(&mut self) -> Result<bool, AppError> {
        info!("Verifying application: {}", self.desc.appbase);
        info!("Version: {}", self.desc.version);
        info!("Class: {}", self.desc.entry_class);

        self.digest = match Manifest::load(&self.appdir) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                info!(
                    "Failed to load digest manifest: {}. Attempting recovery...",
                    e
                );
                None
            }
        };

        if self.desc.version == UNVERSIONED {
            // unversioned deployments refresh the manifest on every run; a
            // changed manifest invalidates every cached validity marker
            let olddig = self
                .digest
                .as_ref()
                .map(|m| m.meta_digest().to_string())
                .unwrap_or_default();
            self.download_control_file(DIGEST_FILE)?;
            let manifest = Manifest::load(&self.appdir)?;
            if olddig != manifest.meta_digest() {
                info!("Unversioned manifest changed. Revalidating all resources...");
                self.clear_validation_markers();
            }
            self.digest = Some(manifest);
        } else if self.digest.is_none() {
            // one recovery download; failures past this point propagate
            self.download_control_file(DIGEST_FILE)?;
            self.digest = Some(Manifest::load(&self.appdir)?);
        }

        // the descriptor itself must match the manifest
        let crsrc = self.config_resource()?;
        let valid = match self.digest.as_ref() {
            Some(manifest) => manifest.validate(&crsrc).unwrap_or(false),
            None => false,
        };
        if !valid {
            self.download_control_file(CONFIG_FILE)?;
            let revalid = match self.digest.as_ref() {
                Some(manifest) => manifest.validate(&crsrc).unwrap_or(false),
                None => false,
            };
            if revalid {
                // the fresh copy checks out; pick up whatever changed
                self.init()?;
            } else {
                return Err(AppError::ManifestValidation);
            }
        }

        // assume we are current until the marker file says otherwise
        self.target_version = self.desc.version;
        match read_target_version(&self.local_path(VERSION_FILE)) {
            Ok(Some(version)) => self.target_version = version,
            Ok(None) => {}
            Err(e) => info!("Unable to read version file: {}", e),
        }

        Ok(self.desc.version != self.target_version)
    }

    /// Validate every declared resource against the manifest, trusting
    /// persisted validity markers. Returns the resources that failed; an
    /// empty list means the application is ready to launch.
    pub fn verify_resources(&self) -> Vec<Resource> {
        let mut failures = Vec::new();
        self.verify_list(&self.desc.codes, &mut failures);
        self.verify_list(&self.desc.resources, &mut failures);
        failures
    }

    fn verify_list(&self, rsrcs: &[Resource], failures: &mut Vec<Resource>) {
        for rsrc in rsrcs {
            if rsrc.is_marked_valid() {
                continue;
            }
            match self.digest.as_ref().map(|m| m.validate(rsrc)) {
                Some(Ok(true)) => {
                    // the marker must be durable before we report success
                    if let Err(e) = rsrc.mark_valid() {
                        warn!("Failed to persist validity marker for {}: {}", rsrc, e);
                        failures.push(rsrc.clone());
                    }
                }
                Some(Ok(false)) => {
                    info!(
                        "Resource failed validation [rsrc={}]. Requesting redownload...",
                        rsrc
                    );
                    failures.push(rsrc.clone());
                }
                Some(Err(e)) => {
                    info!(
                        "Failure validating resource [rsrc={}, error={}]. Requesting redownload...",
                        rsrc, e
                    );
                    failures.push(rsrc.clone());
                }
                None => failures.push(rsrc.clone()),
            }
        }
    }

    /// Clear every resource's persisted validity marker.
    pub fn clear_validation_markers(&self) {
        for rsrc in self.desc.codes.iter().chain(self.desc.resources.iter()) {
            rsrc.clear_marker();
        }
    }

    /// Spawn the application process from the verified install.
    pub fn create_process(&self) -> Result<Child, AppError> {
        launch::spawn(&self.appdir, &self.desc)
    }
}

/// Read the target version override. Absent file or blank content means no
/// override; an unparsable value is an error the caller logs and ignores.
fn read_target_version(path: &Path) -> io::Result<Option<i64>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path)?;
    let line = text.lines().next().unwrap_or("").trim();
    if line.is_empty() {
        return Ok(None);
    }
    line.parse::<i64>()
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
