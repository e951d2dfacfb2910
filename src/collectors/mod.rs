pub mod system;

use crate::analysis::rate::NetSnapshot;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct HostSample {
    pub timestamp: f64,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub net: NetSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KillError {
    #[error("invalid pid: {0}")]
    InvalidPid(String),
    #[error("refusing to terminate the monitor itself (pid={0})")]
    SelfTermination(u32),
    #[error("process no longer exists (pid={0})")]
    NoSuchProcess(u32),
    #[error("access denied (pid={0})")]
    AccessDenied(u32),
}

/// OS access used by the endpoint handlers.
pub trait HostProbe: Send {
    fn sample(&mut self) -> HostSample;
    /// Processes that vanish or deny access during enumeration are left out.
    fn processes(&mut self) -> Vec<ProcessInfo>;
    fn kill(&mut self, pid: u32) -> Result<(), KillError>;
}
