use crate::analysis::advisor::{self, Suggestion};
use crate::analysis::anomaly::AnomalyDetector;
use crate::analysis::forecast::Forecaster;
use crate::analysis::history::CpuHistory;
use crate::analysis::ranking;
use crate::analysis::rate::{NetSnapshot, RateCalculator};
use crate::collectors::{HostProbe, ProcessInfo};
use crate::config::{Config, RankingConfig};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Debug, Clone, Serialize)]
pub struct MetricSample {
    #[serde(rename = "cpu")]
    pub cpu_percent: f64,
    #[serde(rename = "memory")]
    pub memory_percent: f64,
    #[serde(rename = "disk")]
    pub disk_percent: f64,
    #[serde(rename = "net_sent")]
    pub net_sent_bps: f64,
    #[serde(rename = "net_recv")]
    pub net_recv_bps: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSection {
    pub forecast: String,
    pub forecast_trend: Vec<f64>,
    pub optimizations: Vec<Suggestion>,
    pub bottlenecks: Vec<ProcessInfo>,
    #[serde(skip)]
    pub anomalies: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeReport {
    pub metrics: MetricSample,
    pub analysis: AnalysisSection,
    #[serde(skip)]
    pub history_len: usize,
}

/// Everything that survives between polls. One instance per process, behind a mutex.
pub struct State {
    pub poll_count: u64,
    history: CpuHistory,
    rates: RateCalculator,
    forecaster: Forecaster,
    detector: AnomalyDetector,
    ranking: RankingConfig,
}

impl State {
    pub fn new(cfg: &Config, initial_net: NetSnapshot) -> Self {
        Self {
            poll_count: 0,
            history: CpuHistory::with_capacity(cfg.history_capacity),
            rates: RateCalculator::new(initial_net),
            forecaster: Forecaster::new(cfg.forecast.clone()),
            detector: AnomalyDetector::new(cfg.anomaly.clone()),
            ranking: cfg.processes.clone(),
        }
    }

    #[cfg(test)]
    pub fn history(&self) -> &CpuHistory {
        &self.history
    }

    /// One poll: sample, rates, history, forecast, anomalies, advice, process ranking.
    pub fn analyze(&mut self, probe: &mut dyn HostProbe) -> AnalyzeReport {
        let sample = probe.sample();
        let rates = self.rates.advance(sample.net);

        self.history.append(sample.timestamp, sample.cpu_percent);
        let forecast = self.forecaster.forecast(&self.history, sample.timestamp);
        let anomalies = self.detector.detect(&self.history, sample.cpu_percent);
        let optimizations =
            advisor::suggest(sample.cpu_percent, sample.memory_percent, &anomalies);
        let bottlenecks = ranking::top_processes(probe.processes(), &self.ranking);

        self.poll_count = self.poll_count.saturating_add(1);
        debug!(
            poll = self.poll_count,
            history = self.history.len(),
            cpu = sample.cpu_percent,
            anomalies = anomalies.len(),
            "анализ выполнен"
        );

        AnalyzeReport {
            metrics: MetricSample {
                cpu_percent: sample.cpu_percent,
                memory_percent: sample.memory_percent,
                disk_percent: sample.disk_percent,
                net_sent_bps: rates.sent_bytes_per_sec,
                net_recv_bps: rates.recv_bytes_per_sec,
            },
            analysis: AnalysisSection {
                forecast: forecast.message,
                forecast_trend: forecast.trend,
                optimizations,
                bottlenecks,
                anomalies,
            },
            history_len: self.history.len(),
        }
    }
}

#[cfg(test)]
pub mod testing {
    use crate::analysis::rate::NetSnapshot;
    use crate::collectors::{HostProbe, HostSample, KillError, ProcessInfo};
    use std::collections::VecDeque;

    /// Scripted probe: replays queued samples, then repeats the last one.
    #[derive(Default)]
    pub struct FakeProbe {
        pub samples: VecDeque<HostSample>,
        pub last: Option<HostSample>,
        pub processes: Vec<ProcessInfo>,
        pub live_pids: Vec<u32>,
    }

    pub fn sample(at: f64, cpu: f64, sent: u64, recv: u64) -> HostSample {
        HostSample {
            timestamp: at,
            cpu_percent: cpu,
            memory_percent: 40.0,
            disk_percent: 55.0,
            net: NetSnapshot {
                bytes_sent: sent,
                bytes_recv: recv,
                captured_at: at,
            },
        }
    }

    impl HostProbe for FakeProbe {
        fn sample(&mut self) -> HostSample {
            if let Some(next) = self.samples.pop_front() {
                self.last = Some(next);
            }
            self.last.clone().unwrap_or_else(|| sample(0.0, 0.0, 0, 0))
        }

        fn processes(&mut self) -> Vec<ProcessInfo> {
            self.processes.clone()
        }

        fn kill(&mut self, pid: u32) -> Result<(), KillError> {
            if !self.live_pids.contains(&pid) {
                return Err(KillError::NoSuchProcess(pid));
            }
            self.live_pids.retain(|p| *p != pid);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{sample, FakeProbe};
    use super::*;
    use crate::analysis::advisor::Severity;
    use crate::analysis::forecast::GATHERING_MESSAGE;

    fn seeded_config() -> Config {
        let mut cfg = Config::default();
        cfg.forecast.seed = Some(3);
        cfg.anomaly.seed = Some(3);
        cfg
    }

    #[test]
    fn first_poll_reports_rates_and_placeholder_forecast() {
        let mut probe = FakeProbe::default();
        probe.samples.push_back(sample(10.0, 30.0, 3000, 6000));
        probe.processes = vec![ProcessInfo {
            pid: 42,
            name: "cargo".to_string(),
            cpu_percent: 12.5,
            memory_percent: 3.0,
        }];
        let initial = NetSnapshot {
            bytes_sent: 1000,
            bytes_recv: 2000,
            captured_at: 8.0,
        };
        let mut state = State::new(&seeded_config(), initial);

        let report = state.analyze(&mut probe);

        assert_eq!(report.metrics.net_sent_bps, 1000.0);
        assert_eq!(report.metrics.net_recv_bps, 2000.0);
        assert_eq!(report.analysis.forecast, GATHERING_MESSAGE);
        assert!(report.analysis.forecast_trend.is_empty());
        assert_eq!(report.analysis.optimizations[0].severity, Severity::Normal);
        assert_eq!(report.analysis.bottlenecks.len(), 1);
        assert_eq!(report.history_len, 1);
        assert_eq!(state.poll_count, 1);
    }

    #[test]
    fn history_is_bounded_and_forecast_appears_after_twenty_polls() {
        let mut probe = FakeProbe::default();
        for i in 0..130 {
            probe
                .samples
                .push_back(sample(100.0 + i as f64, 20.0 + (i % 4) as f64, 0, 0));
        }
        let mut state = State::new(&seeded_config(), NetSnapshot::default());

        for _ in 0..20 {
            let report = state.analyze(&mut probe);
            assert!(report.analysis.forecast_trend.is_empty());
        }
        let report = state.analyze(&mut probe);
        assert_eq!(report.analysis.forecast_trend.len(), 30);

        for _ in 0..109 {
            state.analyze(&mut probe);
        }
        assert_eq!(state.history().len(), 120);
        assert_eq!(state.history().iter().last().map(|e| e.timestamp), Some(229.0));
    }

    #[test]
    fn report_serializes_with_dashboard_keys() {
        let mut probe = FakeProbe::default();
        probe.samples.push_back(sample(1.0, 90.0, 0, 0));
        let mut state = State::new(&seeded_config(), NetSnapshot::default());

        let json = serde_json::to_value(state.analyze(&mut probe)).unwrap();
        for key in ["cpu", "memory", "disk", "net_sent", "net_recv"] {
            assert!(json["metrics"].get(key).is_some(), "missing metrics.{key}");
        }
        for key in ["forecast", "forecast_trend", "optimizations", "bottlenecks"] {
            assert!(json["analysis"].get(key).is_some(), "missing analysis.{key}");
        }
        assert_eq!(json["analysis"]["optimizations"][0]["type"], "CRITICAL");
        assert!(json.get("history_len").is_none());
        assert!(json["metrics"].get("timestamp").is_none());
        assert_eq!(json["metrics"].as_object().map(|m| m.len()), Some(5));
    }
}
