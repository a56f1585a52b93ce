//! Settings describing where package sources live and how they are built.

use std::path::PathBuf;

use serde::Deserialize;

/// Package build settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageConfig {
    /// Directory holding the function sources.
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// Staging directory the build command runs in.
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,

    /// Individual files copied from `source_dir` into `build_dir`.
    #[serde(default = "default_files")]
    pub files: Vec<String>,

    /// Directories replaced wholesale in `build_dir` on every build.
    #[serde(default = "default_dirs")]
    pub dirs: Vec<String>,

    /// Command run inside `build_dir`. Split on whitespace; empty skips the
    /// build step.
    #[serde(default = "default_build_command")]
    pub build_command: String,

    /// Archive file name, created inside `build_dir`.
    #[serde(default = "default_archive_name")]
    pub archive_name: String,
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("../hefoki-backend")
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("build/updater")
}

fn default_files() -> Vec<String> {
    vec!["package.json".to_owned(), "package-lock.json".to_owned()]
}

fn default_dirs() -> Vec<String> {
    vec!["src".to_owned()]
}

fn default_build_command() -> String {
    "npm ci".to_owned()
}

fn default_archive_name() -> String {
    "package.zip".to_owned()
}

impl PackageConfig {
    /// Location of the archive produced by a build.
    pub fn archive_path(&self) -> PathBuf {
        self.build_dir.join(&self.archive_name)
    }
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            build_dir: default_build_dir(),
            files: default_files(),
            dirs: default_dirs(),
            build_command: default_build_command(),
            archive_name: default_archive_name(),
        }
    }
}
