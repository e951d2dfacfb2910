use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_dashboard_path")]
    pub dashboard_path: String,
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub anomaly: AnomalyConfig,
    #[serde(default)]
    pub processes: RankingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForecastConfig {
    #[serde(default = "default_forecast_min_points")]
    pub min_points: usize,
    #[serde(default = "default_forecast_horizon")]
    pub horizon: usize,
    #[serde(default = "default_forecast_step_secs")]
    pub step_secs: f64,
    #[serde(default = "default_noise_factor")]
    pub noise_factor: f64,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnomalyConfig {
    #[serde(default = "default_anomaly_min_points")]
    pub min_points: usize,
    #[serde(default = "default_contamination")]
    pub contamination: f64,
    #[serde(default = "default_trees")]
    pub trees: usize,
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RankingConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_min_cpu_percent")]
    pub min_cpu_percent: f64,
    #[serde(default = "default_deny_list")]
    pub deny_list: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            dashboard_path: default_dashboard_path(),
            history_capacity: default_history_capacity(),
            forecast: ForecastConfig::default(),
            anomaly: AnomalyConfig::default(),
            processes: RankingConfig::default(),
        }
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            min_points: default_forecast_min_points(),
            horizon: default_forecast_horizon(),
            step_secs: default_forecast_step_secs(),
            noise_factor: default_noise_factor(),
            seed: None,
        }
    }
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            min_points: default_anomaly_min_points(),
            contamination: default_contamination(),
            trees: default_trees(),
            max_samples: default_max_samples(),
            seed: None,
        }
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            min_cpu_percent: default_min_cpu_percent(),
            deny_list: default_deny_list(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("не удалось прочитать файл конфигурации {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("не удалось разобрать YAML в {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("ошибка валидации конфигурации: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let cfg: Config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen.trim().is_empty() {
            return Err(ConfigError::Validation(
                "поле listen обязательно".to_string(),
            ));
        }
        let addr = SocketAddr::from_str(&self.listen).map_err(|_| {
            ConfigError::Validation(
                "поле listen должно быть корректным адресом host:port".to_string(),
            )
        })?;
        if !addr.ip().is_loopback() {
            return Err(ConfigError::Validation(
                "поле listen должно указывать на loopback-адрес".to_string(),
            ));
        }
        if self.dashboard_path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "поле dashboard_path не должно быть пустым".to_string(),
            ));
        }
        if self.history_capacity < 2 {
            return Err(ConfigError::Validation(
                "history_capacity должно быть >= 2".to_string(),
            ));
        }

        validate_forecast(&self.forecast, self.history_capacity)?;
        validate_anomaly(&self.anomaly, self.history_capacity)?;
        validate_processes(&self.processes)?;

        Ok(())
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn validate_forecast(cfg: &ForecastConfig, capacity: usize) -> Result<(), ConfigError> {
    if cfg.min_points < 2 || cfg.min_points >= capacity {
        return Err(ConfigError::Validation(format!(
            "forecast.min_points должно быть в диапазоне 2..{capacity}"
        )));
    }
    if cfg.horizon < 1 {
        return Err(ConfigError::Validation(
            "forecast.horizon должно быть >= 1".to_string(),
        ));
    }
    if !(cfg.step_secs > 0.0 && cfg.step_secs.is_finite()) {
        return Err(ConfigError::Validation(
            "forecast.step_secs должно быть > 0".to_string(),
        ));
    }
    if !(cfg.noise_factor >= 0.0 && cfg.noise_factor.is_finite()) {
        return Err(ConfigError::Validation(
            "forecast.noise_factor должно быть >= 0".to_string(),
        ));
    }
    Ok(())
}

fn validate_anomaly(cfg: &AnomalyConfig, capacity: usize) -> Result<(), ConfigError> {
    if cfg.min_points < 2 || cfg.min_points >= capacity {
        return Err(ConfigError::Validation(format!(
            "anomaly.min_points должно быть в диапазоне 2..{capacity}"
        )));
    }
    if !(cfg.contamination > 0.0 && cfg.contamination <= 0.5) {
        return Err(ConfigError::Validation(
            "anomaly.contamination должно быть в диапазоне (0, 0.5]".to_string(),
        ));
    }
    if cfg.trees < 1 {
        return Err(ConfigError::Validation(
            "anomaly.trees должно быть >= 1".to_string(),
        ));
    }
    if cfg.max_samples < 2 {
        return Err(ConfigError::Validation(
            "anomaly.max_samples должно быть >= 2".to_string(),
        ));
    }
    Ok(())
}

fn validate_processes(cfg: &RankingConfig) -> Result<(), ConfigError> {
    if cfg.top_n < 1 {
        return Err(ConfigError::Validation(
            "processes.top_n должно быть >= 1".to_string(),
        ));
    }
    if !(0.0..100.0).contains(&cfg.min_cpu_percent) {
        return Err(ConfigError::Validation(
            "processes.min_cpu_percent должно быть в диапазоне 0..100".to_string(),
        ));
    }
    Ok(())
}

fn default_listen() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_dashboard_path() -> String {
    "dashboard.html".to_string()
}

const fn default_history_capacity() -> usize {
    120
}

const fn default_forecast_min_points() -> usize {
    20
}

const fn default_forecast_horizon() -> usize {
    30
}

const fn default_forecast_step_secs() -> f64 {
    2.0
}

const fn default_noise_factor() -> f64 {
    0.8
}

const fn default_anomaly_min_points() -> usize {
    30
}

const fn default_contamination() -> f64 {
    0.1
}

const fn default_trees() -> usize {
    100
}

const fn default_max_samples() -> usize {
    256
}

const fn default_top_n() -> usize {
    5
}

const fn default_min_cpu_percent() -> f64 {
    0.1
}

fn default_deny_list() -> Vec<String> {
    ["System Idle Process", "System", "Registry", "Idle"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
