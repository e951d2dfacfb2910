pub mod advisor;
pub mod anomaly;
pub mod forecast;
pub mod history;
pub mod ranking;
pub mod rate;
