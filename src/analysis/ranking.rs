use crate::collectors::ProcessInfo;
use crate::config::RankingConfig;

/// Busiest processes first; idle and pseudo-process entries are dropped.
pub fn top_processes(processes: Vec<ProcessInfo>, cfg: &RankingConfig) -> Vec<ProcessInfo> {
    let mut busy: Vec<ProcessInfo> = processes
        .into_iter()
        .filter(|p| p.cpu_percent > cfg.min_cpu_percent)
        .filter(|p| !cfg.deny_list.iter().any(|name| name == &p.name))
        .collect();

    busy.sort_by(|a, b| {
        b.cpu_percent
            .total_cmp(&a.cpu_percent)
            .then_with(|| a.pid.cmp(&b.pid))
    });
    busy.truncate(cfg.top_n);
    busy
}
