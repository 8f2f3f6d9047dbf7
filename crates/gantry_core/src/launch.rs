//! Subprocess construction for the verified application.
//!
//! Builds an interpreter-style argument vector (runtime binary, classpath
//! flag, runtime args, entry class, app args) with `%APPDIR%` and
//! `%VERSION%` substituted per argument, then spawns the process.

use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use tracing::info;

use crate::descriptor::{Descriptor, VERSION_PLACEHOLDER};
use crate::error::AppError;

/// Install-directory placeholder substituted into launch arguments.
pub const APPDIR_PLACEHOLDER: &str = "%APPDIR%";

/// Separator used when joining code resources into a single path list.
pub const PATH_LIST_SEPARATOR: &str = if cfg!(windows) { ";" } else { ":" };

/// Substitute `%APPDIR%` and `%VERSION%` in one argument, independently and
/// unconditionally.
pub fn substitute(arg: &str, appdir: &str, version: i64) -> String {
    arg.replace(APPDIR_PLACEHOLDER, appdir)
        .replace(VERSION_PLACEHOLDER, &version.to_string())
}

/// Build the argument vector for the application process: classpath flag and
/// value, substituted runtime args, entry class, substituted app args. The
/// runtime binary itself is resolved separately in [`spawn`].
pub fn build_args(appdir: &Path, desc: &Descriptor) -> Vec<String> {
    let appdir_abs = absolute(appdir);
    let appdir_str = appdir_abs.display().to_string();

    let classpath = desc
        .codes
        .iter()
        .map(|rsrc| appdir_abs.join(rsrc.path()).display().to_string())
        .collect::<Vec<_>>()
        .join(PATH_LIST_SEPARATOR);

    let mut args = Vec::with_capacity(3 + desc.jvmargs.len() + desc.appargs.len());
    args.push("-classpath".to_string());
    args.push(classpath);
    for arg in &desc.jvmargs {
        args.push(substitute(arg, &appdir_str, desc.version));
    }
    args.push(desc.entry_class.clone());
    for arg in &desc.appargs {
        args.push(substitute(arg, &appdir_str, desc.version));
    }
    args
}

/// Spawn the application process. Spawn failures propagate; there is no
/// fallback runtime.
pub fn spawn(appdir: &Path, desc: &Descriptor) -> Result<Child, AppError> {
    let runtime = find_runtime().map_err(AppError::ProcessSpawn)?;
    let args = build_args(appdir, desc);
    info!("Running {} {}", runtime.display(), args.join(" "));
    Command::new(&runtime)
        .args(&args)
        .spawn()
        .map_err(AppError::ProcessSpawn)
}

/// Locate the runtime binary: `$JAVA_HOME/bin/java` when set, else `java`
/// from the search path.
fn find_runtime() -> io::Result<PathBuf> {
    let binary = if cfg!(windows) { "java.exe" } else { "java" };
    if let Ok(home) = env::var("JAVA_HOME") {
        let path = Path::new(&home).join("bin").join(binary);
        if path.exists() {
            return Ok(path);
        }
    }
    which::which(binary).map_err(|e| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no usable runtime found: {}", e),
        )
    })
}

fn absolute(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigMap;

    fn make_descriptor(text: &str) -> Descriptor {
        let cfg = ConfigMap::parse(text);
        let base = Descriptor::parse_base(&cfg).unwrap();
        let (desc, _) = Descriptor::parse_rest(&cfg, base, Path::new("/opt/app")).unwrap();
        desc
    }

    #[test]
    fn test_substitution_is_per_argument() {
        assert_eq!(substitute("-Xmx%VERSION%m", "/opt/app", 3), "-Xmx3m");
        assert_eq!(substitute("--home=%APPDIR%", "/opt/app", 3), "--home=/opt/app");
        assert_eq!(substitute("plain", "/opt/app", 3), "plain");
        assert_eq!(
            substitute("%APPDIR%/%VERSION%", "/opt/app", 3),
            "/opt/app/3"
        );
    }

    #[test]
    fn test_argument_vector_shape() {
        let desc = make_descriptor(
            "appbase = http://example.com/app\n\
             version = 3\n\
             class = app.Main\n\
             code = a.jar\n\
             code = lib/b.jar\n\
             jvmarg = -Xmx%VERSION%m\n\
             apparg = --home=%APPDIR%\n",
        );
        let args = build_args(Path::new("/opt/app"), &desc);

        let classpath = format!(
            "/opt/app/a.jar{}/opt/app/lib/b.jar",
            PATH_LIST_SEPARATOR
        );
        assert_eq!(
            args,
            vec![
                "-classpath".to_string(),
                classpath,
                "-Xmx3m".to_string(),
                "app.Main".to_string(),
                "--home=/opt/app".to_string(),
            ]
        );
    }

    #[test]
    fn test_classpath_preserves_code_order() {
        let desc = make_descriptor(
            "appbase = http://example.com/app\n\
             class = app.Main\n\
             code = z.jar\n\
             code = a.jar\n",
        );
        let args = build_args(Path::new("/opt/app"), &desc);
        let expected = format!("/opt/app/z.jar{}/opt/app/a.jar", PATH_LIST_SEPARATOR);
        assert_eq!(args[1], expected);
    }
}
