//! Digest manifest loading and resource validation.
//!
//! `digest.txt` records the expected sha256 for every declared resource, one
//! `path = hex` line per resource, and closes with a line recording the
//! digest of the manifest body itself. The manifest refuses to load unless
//! that self-check passes, so a torn or tampered manifest reads as missing
//! rather than as a source of bogus expectations.

use sha2::{Digest as _, Sha256};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;
use thiserror::Error;

use crate::resource::Resource;

/// Name of the digest manifest control file.
pub const DIGEST_FILE: &str = "digest.txt";

/// Reasons the digest manifest cannot be used.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read {file}: {source}")]
    Read {
        file: String,
        #[source]
        source: io::Error,
    },

    #[error("malformed digest line '{line}'")]
    Malformed { line: String },

    #[error("manifest carries no self-digest line")]
    MissingMetaDigest,

    #[error("manifest failed its own digest check")]
    SelfCheck,
}

/// A loaded, self-verified digest manifest.
#[derive(Debug)]
pub struct Manifest {
    digests: HashMap<String, String>,
    meta_digest: String,
}

impl Manifest {
    /// Load and self-verify the digest manifest in `appdir`.
    pub fn load(appdir: &Path) -> Result<Manifest, ManifestError> {
        let path = appdir.join(DIGEST_FILE);
        let text = fs::read_to_string(&path).map_err(|e| ManifestError::Read {
            file: path.display().to_string(),
            source: e,
        })?;

        let mut digests = HashMap::new();
        let mut hasher = Sha256::new();
        let mut meta_digest = None;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((name, value)) = line.split_once('=') else {
                return Err(ManifestError::Malformed {
                    line: line.to_string(),
                });
            };
            let name = name.trim();
            let value = value.trim();
            if name.is_empty() || value.is_empty() {
                return Err(ManifestError::Malformed {
                    line: line.to_string(),
                });
            }
            if name == DIGEST_FILE {
                // self-digest line closes the manifest
                meta_digest = Some(value.to_string());
                break;
            }
            hasher.update(entry_line(name, value));
            digests.insert(name.to_string(), value.to_string());
        }

        let meta_digest = meta_digest.ok_or(ManifestError::MissingMetaDigest)?;
        let computed = format!("{:x}", hasher.finalize());
        if meta_digest != computed {
            return Err(ManifestError::SelfCheck);
        }

        Ok(Manifest {
            digests,
            meta_digest,
        })
    }

    /// Compute digests for the named files under `appdir` and write a fresh
    /// manifest. This is the deploy-side companion to [`Manifest::load`].
    pub fn create(appdir: &Path, paths: &[&str]) -> io::Result<()> {
        let mut body = String::new();
        let mut hasher = Sha256::new();
        for path in paths {
            let digest = sha256_file(&appdir.join(path))?;
            let line = entry_line(path, &digest);
            hasher.update(&line);
            body.push_str(&line);
        }
        body.push_str(&entry_line(
            DIGEST_FILE,
            &format!("{:x}", hasher.finalize()),
        ));
        fs::write(appdir.join(DIGEST_FILE), body)
    }

    /// Whether the resource's local content matches its recorded digest.
    /// Resources the manifest does not know about never validate.
    pub fn validate(&self, rsrc: &Resource) -> io::Result<bool> {
        let Some(expected) = self.digests.get(rsrc.path()) else {
            return Ok(false);
        };
        let actual = sha256_file(rsrc.local())?;
        Ok(&actual == expected)
    }

    /// Digest of the manifest body, used to detect manifest changes across
    /// unversioned refreshes.
    pub fn meta_digest(&self) -> &str {
        &self.meta_digest
    }
}

fn entry_line(name: &str, digest: &str) -> String {
    format!("{} = {}\n", name, digest)
}

/// Streaming sha256 of a file, rendered as lowercase hex.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_resource(dir: &Path, path: &str) -> Resource {
        Resource::new(path, "http://example.com/app/", dir).unwrap()
    }

    #[test]
    fn test_create_then_load_round_trip() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.jar"), b"alpha").unwrap();
        fs::write(dir.path().join("b.jar"), b"beta").unwrap();
        Manifest::create(dir.path(), &["a.jar", "b.jar"]).unwrap();

        let manifest = Manifest::load(dir.path()).unwrap();
        assert!(!manifest.meta_digest().is_empty());
        assert!(manifest.validate(&make_resource(dir.path(), "a.jar")).unwrap());
        assert!(manifest.validate(&make_resource(dir.path(), "b.jar")).unwrap());
    }

    #[test]
    fn test_tampered_file_fails_validation() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.jar"), b"alpha").unwrap();
        Manifest::create(dir.path(), &["a.jar"]).unwrap();
        fs::write(dir.path().join("a.jar"), b"tampered").unwrap();

        let manifest = Manifest::load(dir.path()).unwrap();
        assert!(!manifest.validate(&make_resource(dir.path(), "a.jar")).unwrap());
    }

    #[test]
    fn test_unknown_resource_never_validates() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.jar"), b"alpha").unwrap();
        fs::write(dir.path().join("mystery.jar"), b"unknown").unwrap();
        Manifest::create(dir.path(), &["a.jar"]).unwrap();

        let manifest = Manifest::load(dir.path()).unwrap();
        assert!(!manifest
            .validate(&make_resource(dir.path(), "mystery.jar"))
            .unwrap());
    }

    #[test]
    fn test_missing_local_file_is_an_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.jar"), b"alpha").unwrap();
        Manifest::create(dir.path(), &["a.jar"]).unwrap();
        fs::remove_file(dir.path().join("a.jar")).unwrap();

        let manifest = Manifest::load(dir.path()).unwrap();
        assert!(manifest.validate(&make_resource(dir.path(), "a.jar")).is_err());
    }

    #[test]
    fn test_missing_manifest_reports_read_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            Manifest::load(dir.path()),
            Err(ManifestError::Read { .. })
        ));
    }

    #[test]
    fn test_tampered_manifest_fails_self_check() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.jar"), b"alpha").unwrap();
        Manifest::create(dir.path(), &["a.jar"]).unwrap();

        let path = dir.path().join(DIGEST_FILE);
        let tampered = fs::read_to_string(&path)
            .unwrap()
            .replacen("a.jar", "b.jar", 1);
        fs::write(&path, tampered).unwrap();

        assert!(matches!(
            Manifest::load(dir.path()),
            Err(ManifestError::SelfCheck)
        ));
    }

    #[test]
    fn test_manifest_without_meta_line_rejected() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(DIGEST_FILE),
            "a.jar = 0123456789abcdef\n",
        )
        .unwrap();
        assert!(matches!(
            Manifest::load(dir.path()),
            Err(ManifestError::MissingMetaDigest)
        ));
    }

    #[test]
    fn test_malformed_line_rejected() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(DIGEST_FILE), "no separator here\n").unwrap();
        assert!(matches!(
            Manifest::load(dir.path()),
            Err(ManifestError::Malformed { .. })
        ));
    }

    #[test]
    fn test_meta_digest_stable_across_loads() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.jar"), b"alpha").unwrap();
        Manifest::create(dir.path(), &["a.jar"]).unwrap();

        let first = Manifest::load(dir.path()).unwrap().meta_digest().to_string();
        let second = Manifest::load(dir.path()).unwrap().meta_digest().to_string();
        assert_eq!(first, second);
    }
}
