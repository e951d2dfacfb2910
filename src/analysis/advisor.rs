use crate::analysis::anomaly::CPU_ANOMALY;
use serde::Serialize;
use std::collections::BTreeSet;

const CPU_SATURATION_PERCENT: f64 = 85.0;
const CPU_SPIKE_PERCENT: f64 = 50.0;
const MEMORY_CAPACITY_PERCENT: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    Warning,
    Normal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    #[serde(rename = "type")]
    pub severity: Severity,
    #[serde(rename = "msg")]
    pub message: String,
}

impl Suggestion {
    fn new(severity: Severity, message: &str) -> Self {
        Self {
            severity,
            message: message.to_string(),
        }
    }
}

/// Rule table over the current reading. Never returns an empty list.
pub fn suggest(
    cpu_percent: f64,
    memory_percent: f64,
    anomalies: &BTreeSet<String>,
) -> Vec<Suggestion> {
    let mut out = Vec::new();

    if cpu_percent > CPU_SATURATION_PERCENT {
        out.push(Suggestion::new(
            Severity::Critical,
            "CPU Saturation. Throttle background workers.",
        ));
    } else if cpu_percent > CPU_SPIKE_PERCENT && anomalies.contains(CPU_ANOMALY) {
        out.push(Suggestion::new(Severity::Warning, "Unusual CPU spike detected."));
    }

    if memory_percent > MEMORY_CAPACITY_PERCENT {
        out.push(Suggestion::new(
            Severity::Critical,
            "Memory near capacity. Restart required.",
        ));
    }

    if out.is_empty() {
        out.push(Suggestion::new(
            Severity::Normal,
            "System operating within normal AI parameters.",
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn cpu_saturation_is_single_critical() {
        let out = suggest(90.0, 50.0, &tags(&[]));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].severity, Severity::Critical);
        assert!(out[0].message.contains("Saturation"));
    }

    #[test]
    fn quiet_system_is_single_normal() {
        let out = suggest(10.0, 10.0, &tags(&[]));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].severity, Severity::Normal);
    }

    #[test]
    fn anomaly_above_half_load_warns() {
        let out = suggest(60.0, 50.0, &tags(&[CPU_ANOMALY]));
        assert!(out.iter().any(|s| s.severity == Severity::Warning));

        let out = suggest(40.0, 50.0, &tags(&[CPU_ANOMALY]));
        assert_eq!(out[0].severity, Severity::Normal);
    }

    #[test]
    fn saturation_suppresses_spike_warning_and_memory_adds_up() {
        let out = suggest(95.0, 95.0, &tags(&[CPU_ANOMALY]));
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|s| s.severity == Severity::Critical));
        assert!(out[1].message.contains("Memory"));
    }

    #[test]
    fn serializes_with_dashboard_keys() {
        let json = serde_json::to_value(suggest(10.0, 10.0, &tags(&[]))).unwrap();
        assert_eq!(json[0]["type"], "NORMAL");
        assert_eq!(
            json[0]["msg"],
            "System operating within normal AI parameters."
        );
    }
}
