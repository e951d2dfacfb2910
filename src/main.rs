mod analysis;
mod collectors;
mod config;
mod http;
mod metrics;
mod state;

use axum::serve;
use clap::Parser;
use collectors::system::SysinfoProbe;
use collectors::HostProbe;
use config::{Config, ConfigError};
use metrics::Metrics;
use state::State;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "./config.yaml";

#[derive(Parser, Debug)]
#[command(name = "sysopt")]
#[command(version)]
struct Cli {
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,
    #[arg(long)]
    print_default_config: bool,
    /// Overrides `listen` from the config file.
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let cfg = match load_config(&cli) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "не удалось загрузить конфигурацию");
            std::process::exit(1);
        }
    };

    let started = SystemTime::now();
    let now = started
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    // first sample seeds the network counters and primes CPU usage deltas
    let mut probe = SysinfoProbe::new();
    let initial = probe.sample();
    let analysis = Arc::new(Mutex::new(State::new(&cfg, initial.net)));
    let probe: Box<dyn HostProbe> = Box::new(probe);

    let metrics = match Metrics::new(now) {
        Ok(m) => m,
        Err(err) => {
            error!(error = %err, "не удалось инициализировать метрики");
            std::process::exit(1);
        }
    };

    info!(
        listen = %cfg.listen,
        dashboard = %cfg.dashboard_path,
        history_capacity = cfg.history_capacity,
        started_at = %humantime::format_rfc3339_seconds(started),
        "запуск sysopt"
    );

    let listener = match bind_listener(&cfg.listen).await {
        Ok(l) => l,
        Err(err) => {
            error!(error = %err, listen = %cfg.listen, "не удалось запустить HTTP-сервер");
            std::process::exit(1);
        }
    };
    match listener.local_addr() {
        Ok(addr) => info!(url = %format!("http://{addr}"), "дашборд доступен"),
        Err(err) => error!(error = %err, "не удалось определить адрес сервера"),
    }

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let app = http::build_router(http::HttpAppState {
        metrics,
        analysis,
        probe: Arc::new(Mutex::new(probe)),
        dashboard_path: Arc::new(PathBuf::from(&cfg.dashboard_path)),
    });
    let mut http_task = tokio::spawn(async move {
        serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            })
            .await
    });

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(err) = res {
                error!(error = %err, "не удалось дождаться Ctrl+C");
            }
            info!("получен Ctrl+C, выполняется остановка");
        }
        res = &mut http_task => {
            // nothing else keeps the process useful once the server is gone
            match res {
                Ok(Ok(())) => error!("HTTP-сервер остановился без сигнала"),
                Ok(Err(err)) => error!(error = %err, "ошибка HTTP-сервера"),
                Err(err) => error!(error = %err, "задача HTTP-сервера завершилась аварийно"),
            }
            std::process::exit(1);
        }
    }

    let _ = shutdown_tx.send(true);
    match http_task.await {
        Ok(Err(err)) => error!(error = %err, "ошибка HTTP-сервера"),
        Err(err) => error!(error = %err, "задача HTTP-сервера завершилась аварийно"),
        Ok(Ok(())) => {}
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// A missing file at the default location means "run with defaults".
fn load_config(cli: &Cli) -> Result<Config, ConfigError> {
    let mut cfg = if cli.config == DEFAULT_CONFIG_PATH && !Path::new(&cli.config).exists() {
        info!(
            path = %cli.config,
            "файл конфигурации не найден, используются значения по умолчанию"
        );
        Config::default()
    } else {
        Config::load_from_file(&cli.config)?
    };

    if let Some(listen) = &cli.listen {
        cfg.listen = listen.clone();
    }
    cfg.validate()?;
    Ok(cfg)
}

async fn bind_listener(listen: &str) -> io::Result<TcpListener> {
    let addr: SocketAddr = listen
        .parse()
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
    TcpListener::bind(addr).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_fails_when_port_is_taken() {
        let held = bind_listener("127.0.0.1:0").await.unwrap();
        let addr = held.local_addr().unwrap().to_string();

        let err = bind_listener(&addr).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AddrInUse);
    }

    #[tokio::test]
    async fn bind_rejects_malformed_address() {
        let err = bind_listener("localhost-5000").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
