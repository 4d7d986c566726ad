//! Experiment treatments and the telemetry events they emit.
//!
//! Treatments come from the `[experiments]` config section. Every lookup
//! posts a `query-expfeature` event, which is tagged as an activation event.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use regex::Regex;

use crate::config::ExperimentsConfig;

/// Audience an experiment assignment is made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetPopulation {
    Team,
    Internal,
    Insiders,
    Public,
}

impl TargetPopulation {
    /// Map a product quality string to its target population.
    pub fn from_quality(quality: Option<&str>) -> Self {
        match quality {
            Some("stable") => TargetPopulation::Public,
            Some("insider") => TargetPopulation::Insiders,
            Some("exploration") => TargetPopulation::Internal,
            None => TargetPopulation::Team,
            Some(_) => TargetPopulation::Public,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetPopulation::Team => "team",
            TargetPopulation::Internal => "internal",
            TargetPopulation::Insiders => "insider",
            TargetPopulation::Public => "public",
        }
    }
}

/// Source of boolean treatment variables.
pub trait ExperimentationService: Send + Sync {
    /// Look up a flag; `None` when the experiment does not define it.
    fn treatment_flag(&self, config_id: &str, name: &str) -> Option<bool>;
}

fn activation_event_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)query-expfeature").expect("static regex"))
}

/// Telemetry sink for experimentation events.
#[derive(Default)]
pub struct ExperimentationTelemetry {
    shared: Mutex<HashMap<String, String>>,
}

impl ExperimentationTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `name = value` to every subsequent event.
    pub fn set_shared_property(&self, name: &str, value: &str) {
        self.shared
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name.to_string(), value.to_string());
    }

    /// Final property set for an event: `props` overlaid with shared
    /// properties, plus the activation marker for feature queries.
    pub fn event_properties(
        &self,
        event_name: &str,
        props: &HashMap<String, String>,
    ) -> HashMap<String, String> {
        let mut properties = props.clone();
        properties.extend(
            self.shared
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        if activation_event_pattern().is_match(event_name) {
            properties.insert("isActivationEvent".to_string(), "true".to_string());
        }
        properties
    }

    pub fn post_event(&self, event_name: &str, props: &HashMap<String, String>) {
        let properties = self.event_properties(event_name, props);
        tracing::info!(
            target: "telemetry",
            event = %event_name,
            properties = ?properties,
            "telemetry event"
        );
    }
}

/// Treatments read from configuration.
pub struct ConfiguredExperiments {
    treatments: HashMap<String, HashMap<String, bool>>,
    population: TargetPopulation,
    telemetry: ExperimentationTelemetry,
}

impl ConfiguredExperiments {
    pub fn from_config(config: &ExperimentsConfig) -> Self {
        let population = TargetPopulation::from_quality(config.quality.as_deref());
        let telemetry = ExperimentationTelemetry::new();
        telemetry.set_shared_property("targetPopulation", population.as_str());
        Self {
            treatments: config.treatments.clone(),
            population,
            telemetry,
        }
    }

    pub fn population(&self) -> TargetPopulation {
        self.population
    }
}

impl ExperimentationService for ConfiguredExperiments {
    fn treatment_flag(&self, config_id: &str, name: &str) -> Option<bool> {
        let value = self
            .treatments
            .get(config_id)
            .and_then(|flags| flags.get(name))
            .copied();

        let mut props = HashMap::new();
        props.insert("configId".to_string(), config_id.to_string());
        props.insert("feature".to_string(), name.to_string());
        props.insert(
            "treatment".to_string(),
            value.map(|v| v.to_string()).unwrap_or_else(|| "unset".to_string()),
        );
        self.telemetry.post_event("query-expfeature", &props);

        value
    }
}
