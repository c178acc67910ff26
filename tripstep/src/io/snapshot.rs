//! Snapshot file loading.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::snapshot::{Snapshot, parse_snapshot};

/// Read and parse an accessibility dump. Any failure is fatal for the invocation.
pub fn load_snapshot(path: &Path) -> Result<Snapshot> {
    let xml = fs::read_to_string(path)
        .with_context(|| format!("read snapshot {}", path.display()))?;
    let snapshot =
        parse_snapshot(&xml).with_context(|| format!("load snapshot {}", path.display()))?;
    debug!(
        path = %path.display(),
        nodes = snapshot.nodes.len(),
        dominant_package = %snapshot.dominant_package,
        "loaded snapshot"
    );
    Ok(snapshot)
}
