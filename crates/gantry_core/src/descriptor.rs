//! Deployment descriptor parsing.
//!
//! Parsing is two-phase: [`Descriptor::parse_base`] extracts the application
//! base URL and version and must succeed before anything else runs, so that
//! a caller always has a network location to re-fetch the descriptor from if
//! the rest of the parse (or any later verification) fails.

use std::path::Path;
use tracing::warn;
use url::Url;

use crate::config::ConfigMap;
use crate::error::AppError;
use crate::resource::Resource;

/// Version placeholder substituted into the application base URL and into
/// launch arguments.
pub const VERSION_PLACEHOLDER: &str = "%VERSION%";

/// Version value meaning "unversioned deployment".
pub const UNVERSIONED: i64 = -1;

/// Geometry hint for an update display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Display hints parsed from the descriptor. Returned by `init` so a caller
/// can configure a progress display before the heavier verification work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiHints {
    pub name: Option<String>,
    pub progress: Option<Rect>,
    pub status: Option<Rect>,
    pub background: Option<String>,
}

impl UiHints {
    pub fn parse(cfg: &ConfigMap) -> UiHints {
        UiHints {
            name: cfg.get("ui.name").map(str::to_string),
            progress: parse_rect("ui.progress", cfg.get("ui.progress")),
            status: parse_rect("ui.status", cfg.get("ui.status")),
            background: cfg.get("ui.background").map(str::to_string),
        }
    }
}

/// Result of phase-one parsing: enough to re-fetch control files even if
/// everything later fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseInfo {
    pub appbase: String,
    pub version: i64,
    pub vappbase: String,
}

/// A descriptor entry that was rejected rather than kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEntry {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

/// Typed deployment descriptor. Owned exclusively by the orchestrator and
/// replaced wholesale on every re-parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    /// Base network location, normalized to end with `/`.
    pub appbase: String,
    /// Deployment version; [`UNVERSIONED`] means re-check on every run.
    pub version: i64,
    /// `appbase` with the version placeholder substituted.
    pub vappbase: String,
    /// Entry point invoked in the launched process.
    pub entry_class: String,
    /// Code resources, order significant (resolution order at launch).
    pub codes: Vec<Resource>,
    /// Auxiliary resources, order insignificant.
    pub resources: Vec<Resource>,
    /// Raw runtime arguments, placeholder-substituted at launch.
    pub jvmargs: Vec<String>,
    /// Raw application arguments, placeholder-substituted at launch.
    pub appargs: Vec<String>,
}

impl Default for Descriptor {
    fn default() -> Self {
        Descriptor {
            appbase: String::new(),
            version: UNVERSIONED,
            vappbase: String::new(),
            entry_class: String::new(),
            codes: Vec::new(),
            resources: Vec::new(),
            jvmargs: Vec::new(),
            appargs: Vec::new(),
        }
    }
}

impl Descriptor {
    /// Phase one: application base and version. Cheap and side-effect-free.
    pub fn parse_base(cfg: &ConfigMap) -> Result<BaseInfo, AppError> {
        let raw = cfg.get("appbase").ok_or(AppError::MissingAppBase)?;
        let mut appbase = raw.trim().to_string();
        if !appbase.ends_with('/') {
            appbase.push('/');
        }
        Url::parse(&appbase).map_err(|e| AppError::InvalidAppBase {
            value: appbase.clone(),
            source: e,
        })?;

        let version = match cfg.get("version") {
            None => UNVERSIONED,
            Some(v) => v.trim().parse::<i64>().map_err(|e| AppError::InvalidVersion {
                value: v.to_string(),
                source: e,
            })?,
        };

        let vappbase = if version < 0 {
            appbase.clone()
        } else {
            let substituted = appbase.replace(VERSION_PLACEHOLDER, &version.to_string());
            Url::parse(&substituted).map_err(|e| AppError::InvalidAppBase {
                value: substituted.clone(),
                source: e,
            })?;
            substituted
        };

        Ok(BaseInfo {
            appbase,
            version,
            vappbase,
        })
    }

    /// A descriptor carrying only phase-one state. Lists are empty.
    pub fn from_base(base: BaseInfo) -> Descriptor {
        Descriptor {
            appbase: base.appbase,
            version: base.version,
            vappbase: base.vappbase,
            ..Descriptor::default()
        }
    }

    /// Phase two: entry class, resource lists, launch arguments. Individual
    /// bad `code`/`resource` entries are partitioned into the rejected set
    /// rather than failing the parse.
    pub fn parse_rest(
        cfg: &ConfigMap,
        base: BaseInfo,
        appdir: &Path,
    ) -> Result<(Descriptor, Vec<RejectedEntry>), AppError> {
        let entry_class = cfg
            .get("class")
            .ok_or(AppError::MissingClass)?
            .to_string();

        let mut rejected = Vec::new();

        let code_paths = cfg.get_multi("code");
        if code_paths.is_empty() {
            return Err(AppError::MissingCode);
        }
        let mut codes: Vec<Resource> = Vec::new();
        for path in code_paths {
            if codes.iter().any(|r| r.path() == path) {
                rejected.push(RejectedEntry {
                    key: "code",
                    value: path.to_string(),
                    reason: "duplicate path".to_string(),
                });
                continue;
            }
            match Resource::new(path, &base.vappbase, appdir) {
                Ok(rsrc) => codes.push(rsrc),
                Err(reason) => rejected.push(RejectedEntry {
                    key: "code",
                    value: path.to_string(),
                    reason: reason.to_string(),
                }),
            }
        }

        let mut resources = Vec::new();
        for path in cfg.get_multi("resource") {
            match Resource::new(path, &base.vappbase, appdir) {
                Ok(rsrc) => resources.push(rsrc),
                Err(reason) => rejected.push(RejectedEntry {
                    key: "resource",
                    value: path.to_string(),
                    reason: reason.to_string(),
                }),
            }
        }

        let jvmargs = cfg.get_multi("jvmarg").iter().map(|s| s.to_string()).collect();
        let appargs = cfg.get_multi("apparg").iter().map(|s| s.to_string()).collect();

        Ok((
            Descriptor {
                appbase: base.appbase,
                version: base.version,
                vappbase: base.vappbase,
                entry_class,
                codes,
                resources,
                jvmargs,
                appargs,
            },
            rejected,
        ))
    }
}

/// Lenient rectangle parse: four integers separated by commas and/or
/// whitespace. Anything else is warned about and ignored.
fn parse_rect(name: &str, value: Option<&str>) -> Option<Rect> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    let parts: Vec<i32> = value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect();
    if parts.len() == 4 {
        Some(Rect {
            x: parts[0],
            y: parts[1],
            width: parts[2],
            height: parts[3],
        })
    } else {
        warn!("Ignoring invalid '{}' config '{}'", name, value);
        None
    }
}
