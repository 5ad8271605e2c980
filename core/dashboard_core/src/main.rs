use clap::Parser;
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Duration,
};
use tracing::info;

use dashboard_core::api::{self, AppState};
use dashboard_core::refresh::{RefreshConfig, Refresher};
use dashboard_core::source::SheetSource;

const DEFAULT_PORT: u16 = 17800;

#[derive(Parser, Debug)]
#[command(name = "dashboard_core", version)]
struct Args {
    /// Listen address.
    ///
    /// Accepts:
    /// - ip:port (recommended), e.g. 127.0.0.1:17800
    /// - ip (implies port 17800), e.g. 127.0.0.1
    #[arg(long, default_value = "127.0.0.1:17800")]
    listen: String,

    /// Google Sheets document id. The sheet must be readable by anyone with the link.
    #[arg(long, required_unless_present = "csv_url", conflicts_with = "csv_url")]
    sheet_id: Option<String>,

    /// Any URL that serves the task table as CSV (header row: Task, Description, Status).
    #[arg(long)]
    csv_url: Option<String>,

    /// Refresh tick interval (seconds).
    #[arg(long, default_value_t = 60)]
    refresh_seconds: u64,

    /// How long a loaded dataset counts as fresh (seconds).
    #[arg(long, default_value_t = 60)]
    cache_ttl_seconds: u64,

    /// Give up on a fetch after this many seconds and keep the previous data.
    #[arg(long, default_value_t = 15)]
    fetch_timeout_seconds: u64,

    /// Start with periodic refresh turned off (manual refresh still works).
    #[arg(long, default_value_t = false)]
    no_auto_refresh: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dashboard_core=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();

    let url = match (&args.csv_url, &args.sheet_id) {
        (Some(url), _) => url.clone(),
        (None, Some(id)) => SheetSource::export_url(id),
        (None, None) => anyhow::bail!("either --sheet-id or --csv-url is required"),
    };
    if args.fetch_timeout_seconds == 0 {
        anyhow::bail!("--fetch-timeout-seconds must be at least 1");
    }

    let config = RefreshConfig {
        interval_seconds: args.refresh_seconds.max(1),
        cache_ttl_seconds: args.cache_ttl_seconds,
        fetch_timeout_seconds: args.fetch_timeout_seconds,
    };
    let source = SheetSource::new(url.clone(), Duration::from_secs(config.fetch_timeout_seconds))?;
    let refresher = Arc::new(Refresher::new(
        Arc::new(source),
        config,
        !args.no_auto_refresh,
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let refresh_task = tokio::spawn(refresher.clone().run(shutdown_rx));

    let app = api::router(AppState { refresher });

    let addr = parse_listen(&args.listen)?;
    info!("Dashboard listening on http://{addr}");
    info!("Source: {url}");
    info!(
        "Refresh every {}s (ttl {}s, timeout {}s, auto {})",
        config.interval_seconds,
        config.cache_ttl_seconds,
        config.fetch_timeout_seconds,
        !args.no_auto_refresh
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    refresh_task.await?;
    Ok(())
}

fn parse_listen(input: &str) -> anyhow::Result<SocketAddr> {
    if let Ok(addr) = input.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = input.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    if let Some((host, port_str)) = input.rsplit_once(':') {
        let host_ip = if host == "localhost" {
            Some(IpAddr::from([127, 0, 0, 1]))
        } else {
            // Unbracketed IPv6, e.g. ::1:17800
            host.parse::<IpAddr>().ok()
        };
        if let Some(ip) = host_ip {
            return Ok(SocketAddr::new(ip, parse_port(input, port_str)?));
        }
    }

    if input == "localhost" {
        return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), DEFAULT_PORT));
    }

    Err(anyhow::anyhow!(
        "invalid --listen '{}'. Use ip:port (e.g. 127.0.0.1:{}) or ip (e.g. 127.0.0.1).",
        input,
        DEFAULT_PORT
    ))
}

fn parse_port(input: &str, port_str: &str) -> anyhow::Result<u16> {
    port_str.parse().map_err(|_| {
        anyhow::anyhow!(
            "invalid --listen '{}': bad port. Example: 127.0.0.1:{}",
            input,
            DEFAULT_PORT
        )
    })
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_listen_accepts_common_forms() {
        assert_eq!(
            parse_listen("0.0.0.0:9000").unwrap(),
            "0.0.0.0:9000".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(parse_listen("127.0.0.1").unwrap().port(), DEFAULT_PORT);
        assert_eq!(parse_listen("localhost:8080").unwrap().port(), 8080);
        assert_eq!(parse_listen("localhost").unwrap().port(), DEFAULT_PORT);
        assert!(parse_listen("localhost:http").is_err());
        assert!(parse_listen("example.com:80").is_err());
    }

    #[test]
    fn parse_listen_accepts_unbracketed_ipv6() {
        let addr = parse_listen("::1:17900").unwrap();
        assert_eq!(addr.ip(), "::1".parse::<IpAddr>().unwrap());
        assert_eq!(addr.port(), 17900);
        assert_eq!(parse_listen("[::1]:9000").unwrap().port(), 9000);
        assert!(parse_listen("::1:99999").is_err());
    }

    #[test]
    fn args_require_a_source() {
        assert!(Args::try_parse_from(["dashboard_core"]).is_err());
        assert!(Args::try_parse_from([
            "dashboard_core",
            "--sheet-id",
            "abc",
            "--csv-url",
            "http://x/y.csv"
        ])
        .is_err());

        let args = Args::try_parse_from(["dashboard_core", "--sheet-id", "abc"]).unwrap();
        assert_eq!(args.refresh_seconds, 60);
        assert_eq!(args.cache_ttl_seconds, 60);
        assert!(!args.no_auto_refresh);
    }
}
