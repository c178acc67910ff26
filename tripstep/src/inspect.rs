//! Read-only diagnostics for `tripstep inspect`.

use std::fmt::Write as _;

use anyhow::{Context, Result};

use crate::core::snapshot::Snapshot;
use crate::plan::TripPlan;
use crate::step::{StepConfig, analyze};

/// Render the engine's view of a snapshot without deciding anything.
pub fn render_inspection(snapshot: &Snapshot, plan: &TripPlan, config: &StepConfig) -> Result<String> {
    let analysis = analyze(snapshot, plan, config);
    let size = snapshot.size;
    let package = if snapshot.dominant_package.is_empty() {
        "-"
    } else {
        snapshot.dominant_package.as_str()
    };

    let mut out = String::new();
    writeln!(out, "phase: {}", analysis.phase.as_str())?;
    writeln!(out, "dominant_package: {package}")?;
    writeln!(
        out,
        "screen: {}x{} nodes={} clickable={}",
        size.width, size.height, size.total_nodes, size.clickable_nodes
    )?;
    writeln!(out, "state_sig: {}", analysis.state_sig)?;
    writeln!(out, "surfaced: {}", analysis.surfaced.len())?;
    for candidate in &analysis.surfaced {
        writeln!(out, "  {}", candidate.summary_line())?;
    }
    let compact =
        serde_json::to_string_pretty(&analysis.compact).context("serialize compact state")?;
    writeln!(out, "compact_state:\n{compact}")?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::snapshot::parse_snapshot;
    use crate::test_support::{hierarchy, sample_plan, ui};

    #[test]
    fn lists_phase_signature_and_candidates() {
        let snapshot = parse_snapshot(&hierarchy(vec![
            ui("[0,0][1080,200]").desc("Show navigation drawer").clickable(),
            ui("[0,200][1080,400]").text("static"),
        ]))
        .expect("parse");
        let out = render_inspection(&snapshot, &sample_plan(), &StepConfig::default())
            .expect("render");
        assert!(out.starts_with("phase: unknown\n"));
        assert!(out.contains("dominant_package: lu.cfl.app"));
        assert!(out.contains("screen: 1080x2400 nodes=2 clickable=1"));
        assert!(out.contains("  [0] android.view.View | id=- | text=- | desc=Show navigation drawer"));
        assert!(out.contains("center=(540,100)"));
        assert!(out.contains("\"candidates\""));
    }
}
