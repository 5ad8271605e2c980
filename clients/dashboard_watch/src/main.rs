use chrono::{DateTime, Local};
use clap::Parser;
use serde::{de::DeserializeOwned, Deserialize};
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "dashboard_watch", version)]
struct Args {
    /// Dashboard core base URL, e.g. http://127.0.0.1:17800
    #[arg(long, default_value = "http://127.0.0.1:17800")]
    core_url: String,

    /// Poll interval (seconds).
    #[arg(long, default_value_t = 60)]
    poll_seconds: u64,

    /// Ask the core to refetch the sheet before the first poll.
    #[arg(long, default_value_t = false)]
    refresh: bool,

    /// Print one status line and exit.
    #[arg(long, default_value_t = false)]
    once: bool,
}

#[derive(Deserialize)]
struct OkResponse<T> {
    ok: bool,
    data: Option<T>,
}

#[derive(Deserialize, Debug)]
struct Counts {
    completed: u64,
    in_progress: u64,
    todo: u64,
    pending: u64,
}

#[derive(Deserialize, Debug)]
struct Snapshot {
    total: u64,
    counts: Counts,
    completion_percentage: f64,
}

#[derive(Deserialize, Debug)]
struct Advisory {
    message: String,
}

#[derive(Deserialize, Debug)]
struct DashboardStatus {
    has_data: bool,
    #[serde(default)]
    last_refresh_ts: Option<String>,
    stale: bool,
    #[serde(default)]
    advisory: Option<Advisory>,
    snapshot: Snapshot,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "result", rename_all = "snake_case")]
enum RefreshOutcome {
    Replaced { tasks: u64 },
    Kept { advisory: Advisory },
    AlreadyRunning,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dashboard_watch=info".into()),
        )
        .init();

    let args = Args::parse();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    let base = args.core_url.trim_end_matches('/').to_string();

    if args.refresh {
        match post_ok::<RefreshOutcome>(&client, &format!("{base}/refresh")).await {
            Ok(RefreshOutcome::Replaced { tasks }) => info!("refreshed: {tasks} tasks loaded"),
            Ok(RefreshOutcome::Kept { advisory }) => {
                warn!("refresh kept previous data: {}", advisory.message)
            }
            Ok(RefreshOutcome::AlreadyRunning) => info!("refresh already in flight"),
            Err(e) => error!("refresh failed: {e}"),
        }
    }

    let endpoint = format!("{base}/snapshot");
    info!("Watching {endpoint}");

    loop {
        match get_ok::<DashboardStatus>(&client, &endpoint).await {
            Ok(status) => println!("{}", status_line(&status)),
            Err(e) => {
                error!("poll failed: {e}");
                if args.once {
                    return Err(e);
                }
            }
        }
        if args.once {
            return Ok(());
        }

        tokio::select! {
            _ = sleep(Duration::from_secs(args.poll_seconds.max(1))) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("stopping");
                return Ok(());
            }
        }
    }
}

async fn get_ok<T: DeserializeOwned>(client: &reqwest::Client, url: &str) -> anyhow::Result<T> {
    let res = client.get(url).send().await?;
    unwrap_ok(res).await
}

async fn post_ok<T: DeserializeOwned>(client: &reqwest::Client, url: &str) -> anyhow::Result<T> {
    let res = client.post(url).send().await?;
    unwrap_ok(res).await
}

async fn unwrap_ok<T: DeserializeOwned>(res: reqwest::Response) -> anyhow::Result<T> {
    if !res.status().is_success() {
        anyhow::bail!("http_{}", res.status().as_u16());
    }
    let body: OkResponse<T> = res.json().await?;
    if !body.ok {
        anyhow::bail!("not_ok");
    }
    body.data.ok_or_else(|| anyhow::anyhow!("missing_data"))
}

fn status_line(status: &DashboardStatus) -> String {
    if !status.has_data {
        let reason = status
            .advisory
            .as_ref()
            .map(|a| a.message.as_str())
            .unwrap_or("waiting for first load");
        return format!("No data yet ({reason})");
    }

    let s = &status.snapshot;
    let mut line = format!(
        "Completion {:.1}% | {} tasks | {} completed · {} in progress · {} to do · {} pending",
        s.completion_percentage,
        s.total,
        s.counts.completed,
        s.counts.in_progress,
        s.counts.todo,
        s.counts.pending
    );
    if let Some(ts) = status.last_refresh_ts.as_deref() {
        line.push_str(&format!(" | updated {}", format_clock(ts)));
    }
    if status.stale {
        line.push_str(" (stale)");
    }
    if let Some(a) = &status.advisory {
        line.push_str(&format!(" | ⚠ {}", a.message));
    }
    line
}

/// Local wall clock as `hh:mm:ss AM`.
fn format_clock(rfc3339: &str) -> String {
    DateTime::parse_from_rfc3339(rfc3339)
        .map(|t| t.with_timezone(&Local).format("%I:%M:%S %p").to_string())
        .unwrap_or_else(|_| "??:??:??".to_string())
}
