//! Package build pipeline: stage sources, run the build command, archive.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tokio::task::spawn_blocking;
use tracing::{info, instrument};

use crate::archive::{copy_tree, zip_directory};
use crate::config::PackageConfig;
use crate::error::{PackagingError, PackagingResult};

/// Builds the deployable package described by a [`PackageConfig`].
#[derive(Debug, Clone)]
pub struct PackageBuilder {
    config: PackageConfig,
}

impl PackageBuilder {
    pub fn new(config: PackageConfig) -> Self {
        Self { config }
    }

    pub fn archive_path(&self) -> PathBuf {
        self.config.archive_path()
    }

    /// Stage, build and archive. Returns the archive path.
    ///
    /// Each configured directory is removed from the staging area before it
    /// is copied again, and any archive left by a previous build is deleted,
    /// so nothing stale reaches the new package.
    #[instrument(skip_all, fields(build_dir = %self.config.build_dir.display()))]
    pub async fn build(&self) -> PackagingResult<PathBuf> {
        let config = self.config.clone();
        spawn_blocking(move || stage(&config))
            .await
            .map_err(|e| PackagingError::Task(e.to_string()))??;

        self.run_build_command().await?;

        let src = self.config.build_dir.clone();
        let dest = self.archive_path();
        let archive = dest.clone();
        let files = spawn_blocking(move || zip_directory(&src, &dest))
            .await
            .map_err(|e| PackagingError::Task(e.to_string()))??;

        info!(archive = %archive.display(), files, "package built");
        Ok(archive)
    }

    /// Contents of the most recently built archive.
    pub async fn read_archive(&self) -> PackagingResult<Vec<u8>> {
        let path = self.archive_path();
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PackagingError::MissingArchive(path))
            }
            Err(e) => Err(PackagingError::io(path, e)),
        }
    }

    async fn run_build_command(&self) -> PackagingResult<()> {
        let mut parts = self.config.build_command.split_whitespace();
        let Some(program) = parts.next() else {
            return Ok(());
        };

        info!(command = %self.config.build_command, "running build command");
        let status = Command::new(program)
            .args(parts)
            .current_dir(&self.config.build_dir)
            .status()
            .await
            .map_err(|e| PackagingError::io(&self.config.build_dir, e))?;

        if status.success() {
            Ok(())
        } else {
            Err(PackagingError::BuildFailed {
                command: self.config.build_command.clone(),
                code: status.code(),
            })
        }
    }
}

fn stage(config: &PackageConfig) -> PackagingResult<()> {
    let build_dir = &config.build_dir;
    std::fs::create_dir_all(build_dir).map_err(|e| PackagingError::io(build_dir, e))?;

    for file in &config.files {
        let from = config.source_dir.join(file);
        std::fs::copy(&from, build_dir.join(file)).map_err(|e| PackagingError::io(&from, e))?;
    }

    for dir in &config.dirs {
        let target = build_dir.join(dir);
        remove_if_present(&target, true)?;
        copy_tree(&config.source_dir.join(dir), &target)?;
    }

    remove_if_present(&config.archive_path(), false)
}

fn remove_if_present(path: &Path, dir: bool) -> PackagingResult<()> {
    let removed = if dir {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    match removed {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PackagingError::io(path, e)),
    }
}
