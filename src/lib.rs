//! Self-update pipeline for the SMOL mod manager.
//!
//! Build-time staging (`smol-stager`) walks each distributable artifact,
//! describes every file in an update manifest and ships the manifest next to
//! the build. At runtime the standalone helper (`smol-installer`) replaces
//! application files once the main process has exited, then optionally
//! relaunches it.

pub mod channel;
pub mod error;
pub mod installer;
pub mod manifest;
pub mod stager;
