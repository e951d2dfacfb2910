use crate::analysis::history::CpuHistory;
use crate::config::ForecastConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;
use serde::Serialize;

pub const GATHERING_MESSAGE: &str = "Gathering data...";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Forecast {
    pub message: String,
    pub trend: Vec<f64>,
}

impl Forecast {
    fn gathering() -> Self {
        Self {
            message: GATHERING_MESSAGE.to_string(),
            trend: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn predict(&self, t: f64) -> f64 {
        self.slope * t + self.intercept
    }
}

pub struct Forecaster {
    cfg: ForecastConfig,
    rng: StdRng,
}

impl Forecaster {
    pub fn new(cfg: ForecastConfig) -> Self {
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { cfg, rng }
    }

    /// Projects CPU load `horizon` steps past `now`; noise makes the result vary between calls.
    pub fn forecast(&mut self, history: &CpuHistory, now: f64) -> Forecast {
        if history.len() <= self.cfg.min_points {
            return Forecast::gathering();
        }

        let points: Vec<(f64, f64)> = history
            .iter()
            .map(|e| (e.timestamp, e.cpu_percent))
            .collect();
        let fit = linear_fit(&points);
        let volatility = std_dev(&history.values());
        let noise = Normal::new(0.0, volatility * self.cfg.noise_factor)
            .ok()
            .filter(|_| volatility > 0.0);

        let trend: Vec<f64> = (1..=self.cfg.horizon)
            .map(|i| {
                let base = fit.predict(now + i as f64 * self.cfg.step_secs);
                let jitter = noise.map(|n| self.rng.sample(n)).unwrap_or(0.0);
                (base + jitter).clamp(0.0, 100.0)
            })
            .collect();

        let mean = trend.iter().sum::<f64>() / trend.len() as f64;
        Forecast {
            message: format!("Forecast: CPU likely to hit {mean:.1}% range."),
            trend,
        }
    }
}

/// Ordinary least squares on mean-centered `t`; unix timestamps squared lose precision otherwise.
pub fn linear_fit(points: &[(f64, f64)]) -> LinearFit {
    if points.is_empty() {
        return LinearFit {
            slope: 0.0,
            intercept: 0.0,
        };
    }
    let n = points.len() as f64;
    let mean_t = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_v = points.iter().map(|p| p.1).sum::<f64>() / n;

    let (cov, var) = points.iter().fold((0.0, 0.0), |(cov, var), (t, v)| {
        let dt = t - mean_t;
        (cov + dt * (v - mean_v), var + dt * dt)
    });

    let slope = if var > f64::EPSILON { cov / var } else { 0.0 };
    LinearFit {
        slope,
        intercept: mean_v - slope * mean_t,
    }
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Forecaster {
        Forecaster::new(ForecastConfig {
            seed: Some(42),
            ..ForecastConfig::default()
        })
    }

    fn history_of(n: usize, f: impl Fn(usize) -> f64) -> CpuHistory {
        let mut history = CpuHistory::with_capacity(120);
        for i in 0..n {
            history.append(1_700_000_000.0 + i as f64, f(i));
        }
        history
    }

    #[test]
    fn placeholder_until_enough_points() {
        let history = history_of(20, |i| i as f64);
        let forecast = seeded().forecast(&history, 1_700_000_019.0);

        assert_eq!(forecast.message, GATHERING_MESSAGE);
        assert!(forecast.trend.is_empty());
    }

    #[test]
    fn thirty_bounded_points_once_enough_history() {
        let history = history_of(60, |i| if i % 2 == 0 { 5.0 } else { 95.0 });
        let forecast = seeded().forecast(&history, 1_700_000_059.0);

        assert_eq!(forecast.trend.len(), 30);
        assert!(forecast.trend.iter().all(|v| (0.0..=100.0).contains(v)));
        assert!(forecast.message.starts_with("Forecast: CPU likely to hit "));
        assert!(forecast.message.ends_with("% range."));
    }

    #[test]
    fn flat_history_projects_flat_line() {
        let history = history_of(25, |_| 40.0);
        let forecast = seeded().forecast(&history, 1_700_000_024.0);

        assert!(forecast.trend.iter().all(|v| (v - 40.0).abs() < 1e-6));
        assert_eq!(forecast.message, "Forecast: CPU likely to hit 40.0% range.");
    }

    #[test]
    fn rising_trend_is_clamped_at_100() {
        let history = history_of(30, |i| i as f64 * 4.0);
        let mut forecaster = Forecaster::new(ForecastConfig {
            seed: Some(1),
            noise_factor: 0.0,
            ..ForecastConfig::default()
        });
        let forecast = forecaster.forecast(&history, 1_700_000_029.0);

        assert_eq!(forecast.trend.len(), 30);
        assert_eq!(forecast.trend.last().copied(), Some(100.0));
    }

    #[test]
    fn same_seed_same_forecast() {
        let history = history_of(40, |i| 20.0 + (i % 7) as f64 * 3.0);
        let a = seeded().forecast(&history, 1_700_000_039.0);
        let b = seeded().forecast(&history, 1_700_000_039.0);
        assert_eq!(a, b);
    }

    #[test]
    fn linear_fit_recovers_line() {
        let points: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, 3.0 + 2.0 * i as f64)).collect();
        let fit = linear_fit(&points);
        assert!((fit.slope - 2.0).abs() < 1e-9);
        assert!((fit.intercept - 3.0).abs() < 1e-9);

        let same_time = [(5.0, 10.0), (5.0, 20.0)];
        let fit = linear_fit(&same_time);
        assert_eq!(fit.slope, 0.0);
        assert_eq!(fit.predict(100.0), 15.0);
    }

    #[test]
    fn std_dev_is_population() {
        assert_eq!(std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 2.0);
        assert_eq!(std_dev(&[]), 0.0);
    }
}
