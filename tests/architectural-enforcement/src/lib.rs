//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles
//! of the chat crates:
//! - No blocking I/O inside async code
//!
//! These tests are designed to catch violations early in the development cycle.

use std::path::PathBuf;

/// Source directories of the production crates, relative to the workspace root
pub const PRODUCTION_SOURCE_DIRS: &[&str] = &["chat/core/src", "chat/cli/src"];

/// Workspace root, resolved from this package's manifest directory
#[must_use]
pub fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}
