use serde::{Deserialize, Serialize};

pub const DEFAULT_SERVICES: &[&str] = &["TGV", "IC", "TER", "RE", "RB"];

/// Structured trip goal produced by the intent parser.
///
/// Read-only for the decision pipeline: it is never re-derived or mutated here.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TripPlan {
    pub start: String,
    pub destination: String,
    /// `"now"` or an explicit `YYYY-MM-DDTHH:MM` departure/arrival time.
    pub when: String,
    pub arrive_by: bool,
    pub via: Vec<String>,
    pub no_via: bool,
    pub rail_only: bool,
    pub exclude_modes: Vec<String>,
    pub allowed_services: Vec<String>,
}

impl Default for TripPlan {
    fn default() -> Self {
        Self {
            start: String::new(),
            destination: String::new(),
            when: "now".to_string(),
            arrive_by: false,
            via: Vec::new(),
            no_via: false,
            rail_only: false,
            exclude_modes: Vec::new(),
            allowed_services: DEFAULT_SERVICES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl TripPlan {
    pub fn is_now(&self) -> bool {
        self.when.trim().eq_ignore_ascii_case("now")
    }

    pub fn start(&self) -> Option<&str> {
        non_empty(&self.start)
    }

    pub fn destination(&self) -> Option<&str> {
        non_empty(&self.destination)
    }

    /// Default objective when the operator gave no instruction text.
    pub fn objective(&self) -> String {
        let mut objective = format!(
            "Plan a trip in the trip planner from {} to {}",
            self.start.trim(),
            self.destination.trim()
        );
        if !self.is_now() {
            let verb = if self.arrive_by { "arriving by" } else { "departing at" };
            objective.push_str(&format!(" {verb} {}", self.when.trim()));
        }
        if !self.via.is_empty() {
            objective.push_str(&format!(" via {}", self.via.join(", ")));
        } else if self.no_via {
            objective.push_str(" without via stops");
        }
        if !self.exclude_modes.is_empty() {
            objective.push_str(&format!(", excluding {}", self.exclude_modes.join(", ")));
        }
        objective.push('.');
        objective
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let plan: TripPlan =
            serde_json::from_str(r#"{"start":"LUXEMBOURG","destination":"ARLON"}"#).expect("parse");
        assert!(plan.is_now());
        assert_eq!(plan.allowed_services, vec!["TGV", "IC", "TER", "RE", "RB"]);
        assert!(!plan.rail_only);
    }

    #[test]
    fn objective_mentions_route_and_constraints() {
        let plan = TripPlan {
            start: "Luxembourg".to_string(),
            destination: "Arlon".to_string(),
            when: "2026-10-20T08:30".to_string(),
            arrive_by: true,
            exclude_modes: vec!["bus".to_string()],
            ..TripPlan::default()
        };
        let objective = plan.objective();
        assert!(objective.contains("from Luxembourg to Arlon"));
        assert!(objective.contains("arriving by 2026-10-20T08:30"));
        assert!(objective.contains("excluding bus"));
    }

    #[test]
    fn blank_places_are_absent() {
        let plan = TripPlan {
            start: "  ".to_string(),
            ..TripPlan::default()
        };
        assert_eq!(plan.start(), None);
        assert_eq!(plan.destination(), None);
    }
}
