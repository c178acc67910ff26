//! Trip-plan load/save helpers with schema validation.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde_json::Value;
use tracing::info;

use crate::io::config::write_atomic;
use crate::plan::TripPlan;

const PLAN_SCHEMA: &str = include_str!("../../schemas/trip_plan.schema.json");

/// Load and validate a plan from disk.
pub fn load_plan(path: &Path) -> Result<TripPlan> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read plan {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse plan {}", path.display()))?;
    validate_schema(&value).with_context(|| format!("validate plan {}", path.display()))?;
    serde_json::from_value(value).with_context(|| format!("deserialize plan {}", path.display()))
}

/// Check an in-memory plan against the same schema stored plans obey.
pub fn validate_plan(plan: &TripPlan) -> Result<()> {
    let value = serde_json::to_value(plan).context("serialize plan")?;
    validate_schema(&value)
}

/// Write a plan with stable pretty formatting.
pub fn write_plan(path: &Path, plan: &TripPlan) -> Result<()> {
    let value = serde_json::to_value(plan).context("serialize plan")?;
    validate_schema(&value)?;
    let mut buf = serde_json::to_string_pretty(&value).context("serialize plan")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// Reuse the plan stored at `path`, or persist `fallback` there on first use.
///
/// A stored plan always wins: the plan is produced once and then trusted.
pub fn load_or_init_plan(path: &Path, fallback: Option<&TripPlan>) -> Result<TripPlan> {
    if path.exists() {
        return load_plan(path);
    }
    let plan = fallback.ok_or_else(|| {
        anyhow!(
            "plan file {} does not exist and no inline plan was given",
            path.display()
        )
    })?;
    write_plan(path, plan)?;
    info!(path = %path.display(), "stored trip plan");
    Ok(plan.clone())
}

fn validate_schema(plan: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(PLAN_SCHEMA).context("parse plan schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    if !compiled.is_valid(plan) {
        let messages = compiled
            .iter_errors(plan)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "plan schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_plan;

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("plan.json");
        let plan = sample_plan();
        write_plan(&path, &plan).expect("write");
        assert_eq!(load_plan(&path).expect("load"), plan);
    }

    #[test]
    fn rejects_unknown_fields_and_bad_times() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("plan.json");

        fs::write(&path, r#"{"start":"A","destination":"B","speed":"fast"}"#).expect("write");
        let err = load_plan(&path).expect_err("unknown field");
        assert!(format!("{err:#}").contains("schema validation failed"));

        fs::write(&path, r#"{"start":"A","destination":"B","when":"tomorrow"}"#).expect("write");
        assert!(load_plan(&path).is_err());
    }

    #[test]
    fn in_memory_plans_share_the_stored_schema() {
        validate_plan(&sample_plan()).expect("valid");
        let plan = TripPlan {
            when: "tomorrow".to_string(),
            ..sample_plan()
        };
        let err = validate_plan(&plan).expect_err("bad time");
        assert!(err.to_string().contains("schema validation failed"));

        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("plan.json");
        assert!(write_plan(&path, &plan).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn init_writes_once_then_reuses_stored_plan() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("state").join("plan.json");
        let first = sample_plan();
        assert_eq!(load_or_init_plan(&path, Some(&first)).expect("init"), first);

        let other = TripPlan {
            destination: "Ettelbruck".to_string(),
            ..sample_plan()
        };
        let reused = load_or_init_plan(&path, Some(&other)).expect("reuse");
        assert_eq!(reused.destination, "Arlon");
    }

    #[test]
    fn missing_plan_without_fallback_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = load_or_init_plan(&temp.path().join("plan.json"), None).expect_err("missing");
        assert!(err.to_string().contains("does not exist"));
    }
}
