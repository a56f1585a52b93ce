//! Deployable package builder for the updater function.
//!
//! A build copies the configured files and directories from the source tree
//! into a staging directory, runs the build command there (`npm ci` by
//! default) and zips the staging directory into the package archive.

pub mod config;
pub mod error;

mod archive;
mod builder;

pub use builder::PackageBuilder;
pub use config::PackageConfig;
pub use error::{PackagingError, PackagingResult};
