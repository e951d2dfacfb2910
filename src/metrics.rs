use crate::analysis::anomaly::CPU_ANOMALY;
use crate::state::AnalyzeReport;
use prometheus::core::Collector;
use prometheus::{opts, Counter, CounterVec, Encoder, Gauge, Registry, TextEncoder};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    started_at_unix: i64,
    pub sysopt_cpu_usage_percent: Gauge,
    pub sysopt_memory_usage_percent: Gauge,
    pub sysopt_disk_usage_percent: Gauge,
    pub sysopt_net_sent_bytes_per_sec: Gauge,
    pub sysopt_net_recv_bytes_per_sec: Gauge,
    pub sysopt_history_points: Gauge,
    pub sysopt_forecast_mean_percent: Gauge,
    pub sysopt_cpu_anomaly: Gauge,
    pub sysopt_bottleneck_count: Gauge,
    pub sysopt_uptime_seconds: Gauge,
    pub sysopt_analyze_requests_total: Counter,
    pub sysopt_scrape_count_total: Counter,
    pub sysopt_kill_requests_total: CounterVec,
}

impl Metrics {
    pub fn new(started_at_unix: i64) -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let sysopt_cpu_usage_percent = Gauge::with_opts(opts!(
            "sysopt_cpu_usage_percent",
            "Average CPU usage across cores in percent (0..100)"
        ))?;
        let sysopt_memory_usage_percent = Gauge::with_opts(opts!(
            "sysopt_memory_usage_percent",
            "RAM usage in percent"
        ))?;
        let sysopt_disk_usage_percent = Gauge::with_opts(opts!(
            "sysopt_disk_usage_percent",
            "Root filesystem usage in percent"
        ))?;
        let sysopt_net_sent_bytes_per_sec = Gauge::with_opts(opts!(
            "sysopt_net_sent_bytes_per_sec",
            "Transmit rate over all interfaces since the previous poll"
        ))?;
        let sysopt_net_recv_bytes_per_sec = Gauge::with_opts(opts!(
            "sysopt_net_recv_bytes_per_sec",
            "Receive rate over all interfaces since the previous poll"
        ))?;
        let sysopt_history_points = Gauge::with_opts(opts!(
            "sysopt_history_points",
            "Number of CPU samples held for forecasting"
        ))?;
        let sysopt_forecast_mean_percent = Gauge::with_opts(opts!(
            "sysopt_forecast_mean_percent",
            "Mean of the projected CPU trend, 0 while gathering data"
        ))?;
        let sysopt_cpu_anomaly = Gauge::with_opts(opts!(
            "sysopt_cpu_anomaly",
            "1 when the latest CPU reading was classified as an outlier"
        ))?;
        let sysopt_bottleneck_count = Gauge::with_opts(opts!(
            "sysopt_bottleneck_count",
            "Number of processes reported as bottlenecks"
        ))?;
        let sysopt_uptime_seconds =
            Gauge::with_opts(opts!("sysopt_uptime_seconds", "Monitor uptime in seconds"))?;
        let sysopt_analyze_requests_total = Counter::with_opts(opts!(
            "sysopt_analyze_requests_total",
            "Number of /analyze polls served"
        ))?;
        let sysopt_scrape_count_total = Counter::with_opts(opts!(
            "sysopt_scrape_count_total",
            "Number of /metrics scrapes"
        ))?;
        let sysopt_kill_requests_total = CounterVec::new(
            opts!(
                "sysopt_kill_requests_total",
                "Kill-process requests by result"
            ),
            &["result"],
        )?;

        register(&registry, &sysopt_cpu_usage_percent)?;
        register(&registry, &sysopt_memory_usage_percent)?;
        register(&registry, &sysopt_disk_usage_percent)?;
        register(&registry, &sysopt_net_sent_bytes_per_sec)?;
        register(&registry, &sysopt_net_recv_bytes_per_sec)?;
        register(&registry, &sysopt_history_points)?;
        register(&registry, &sysopt_forecast_mean_percent)?;
        register(&registry, &sysopt_cpu_anomaly)?;
        register(&registry, &sysopt_bottleneck_count)?;
        register(&registry, &sysopt_uptime_seconds)?;
        register(&registry, &sysopt_analyze_requests_total)?;
        register(&registry, &sysopt_scrape_count_total)?;
        register(&registry, &sysopt_kill_requests_total)?;

        Ok(Arc::new(Self {
            registry,
            started_at_unix,
            sysopt_cpu_usage_percent,
            sysopt_memory_usage_percent,
            sysopt_disk_usage_percent,
            sysopt_net_sent_bytes_per_sec,
            sysopt_net_recv_bytes_per_sec,
            sysopt_history_points,
            sysopt_forecast_mean_percent,
            sysopt_cpu_anomaly,
            sysopt_bottleneck_count,
            sysopt_uptime_seconds,
            sysopt_analyze_requests_total,
            sysopt_scrape_count_total,
            sysopt_kill_requests_total,
        }))
    }

    pub fn update_from_report(&self, report: &AnalyzeReport) {
        self.sysopt_analyze_requests_total.inc();

        let m = &report.metrics;
        self.sysopt_cpu_usage_percent.set(m.cpu_percent);
        self.sysopt_memory_usage_percent.set(m.memory_percent);
        self.sysopt_disk_usage_percent.set(m.disk_percent);
        self.sysopt_net_sent_bytes_per_sec.set(m.net_sent_bps);
        self.sysopt_net_recv_bytes_per_sec.set(m.net_recv_bps);

        let a = &report.analysis;
        self.sysopt_history_points.set(report.history_len as f64);
        let trend_mean = if a.forecast_trend.is_empty() {
            0.0
        } else {
            a.forecast_trend.iter().sum::<f64>() / a.forecast_trend.len() as f64
        };
        self.sysopt_forecast_mean_percent.set(trend_mean);
        let anomaly = u8::from(a.anomalies.contains(CPU_ANOMALY));
        self.sysopt_cpu_anomaly.set(f64::from(anomaly));
        self.sysopt_bottleneck_count.set(a.bottlenecks.len() as f64);
    }

    pub fn inc_scrape_count(&self) {
        self.sysopt_scrape_count_total.inc();
    }

    pub fn inc_kill_request(&self, result: &str) {
        self.sysopt_kill_requests_total
            .with_label_values(&[result])
            .inc();
    }

    pub fn encode_metrics(&self) -> Result<Vec<u8>, prometheus::Error> {
        let uptime = now_unix().saturating_sub(self.started_at_unix) as f64;
        self.sysopt_uptime_seconds.set(uptime);

        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        let mf = self.registry.gather();
        encoder.encode(&mf, &mut buf)?;
        Ok(buf)
    }
}

fn register<T: Collector + Clone + 'static>(
    registry: &Registry,
    collector: &T,
) -> Result<(), prometheus::Error> {
    registry.register(Box::new(collector.clone()))
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
