//! Backup and restore orchestration.
//!
//! `backup` extracts a source instance, fingerprints it and writes the
//! snapshot artifact. `restore` replays an artifact into a target, extracts
//! the target again, and accepts the migration only when both fingerprints
//! agree. Mismatches are reported with the first diverging checkpoint and
//! leave the target untouched for inspection.

pub mod config;
pub mod error;
pub mod migrator;
pub mod report;

pub use config::MigrateConfig;
pub use error::MigrateError;
pub use migrator::{resolve_address, Migrator};
pub use report::{ArtifactCheck, MigrationReport, MismatchReport};
