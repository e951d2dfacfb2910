use crate::analysis::rate::NetSnapshot;
use crate::collectors::{HostProbe, HostSample, KillError, ProcessInfo};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use sysinfo::{
    CpuExt, DiskExt, NetworkExt, NetworksExt, Pid, PidExt, ProcessExt, System, SystemExt,
};
use tracing::debug;

pub struct SysinfoProbe {
    system: System,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self {
            system: System::new_all(),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl HostProbe for SysinfoProbe {
    fn sample(&mut self) -> HostSample {
        let system = &mut self.system;
        system.refresh_cpu();
        system.refresh_memory();
        system.refresh_disks();
        system.refresh_networks();

        let cpu_percent = if system.cpus().is_empty() {
            0.0
        } else {
            let sum: f32 = system.cpus().iter().map(|c| c.cpu_usage()).sum();
            (sum / system.cpus().len() as f32) as f64
        };

        let (bytes_sent, bytes_recv) = system
            .networks()
            .iter()
            .fold((0_u64, 0_u64), |(sent, recv), (_, data)| {
                (
                    sent.saturating_add(data.total_transmitted()),
                    recv.saturating_add(data.total_received()),
                )
            });

        let timestamp = now_unix_secs();
        HostSample {
            timestamp,
            cpu_percent: cpu_percent.clamp(0.0, 100.0),
            memory_percent: percent(system.used_memory(), system.total_memory()),
            disk_percent: root_disk_percent(system),
            net: NetSnapshot {
                bytes_sent,
                bytes_recv,
                captured_at: timestamp,
            },
        }
    }

    fn processes(&mut self) -> Vec<ProcessInfo> {
        self.system.refresh_processes();
        let total_memory = self.system.total_memory();
        let out: Vec<ProcessInfo> = self
            .system
            .processes()
            .iter()
            .map(|(pid, p)| ProcessInfo {
                pid: pid.as_u32(),
                name: p.name().to_string(),
                cpu_percent: p.cpu_usage() as f64,
                memory_percent: percent(p.memory(), total_memory),
            })
            .collect();
        debug!(count = out.len(), "список процессов обновлен");
        out
    }

    fn kill(&mut self, pid: u32) -> Result<(), KillError> {
        let sys_pid = Pid::from_u32(pid);
        if !self.system.refresh_process(sys_pid) {
            return Err(KillError::NoSuchProcess(pid));
        }
        let process = self
            .system
            .process(sys_pid)
            .ok_or(KillError::NoSuchProcess(pid))?;
        if process.kill() {
            return Ok(());
        }
        let still_running = self.system.refresh_process(sys_pid);
        Err(signal_failure(pid, still_running))
    }
}

/// The process may exit between the refresh and the signal.
fn signal_failure(pid: u32, still_running: bool) -> KillError {
    if still_running {
        KillError::AccessDenied(pid)
    } else {
        KillError::NoSuchProcess(pid)
    }
}

/// Usage of the root filesystem, or of the largest disk when `/` is not mounted.
fn root_disk_percent(system: &System) -> f64 {
    let disks = system.disks();
    disks
        .iter()
        .find(|d| d.mount_point() == Path::new("/"))
        .or_else(|| disks.iter().max_by_key(|d| d.total_space()))
        .map(|d| {
            let total = d.total_space();
            percent(total.saturating_sub(d.available_space()), total)
        })
        .unwrap_or(0.0)
}

fn percent(used: u64, total: u64) -> f64 {
    if total > 0 {
        (used as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

pub fn now_unix_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
