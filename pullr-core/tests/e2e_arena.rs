use std::time::{Duration, Instant};

use pullr_core::{Arena, Config, ErrorKind, Overrides, TestReport};
use pullr_testserver::TestServer;
use tokio::time::timeout;

const RUN_WAIT: Duration = Duration::from_secs(30);

fn config_for(urls: String, tweak: impl FnOnce(&mut Overrides)) -> Config {
    let mut overrides = Overrides {
        urls: Some(urls),
        ..Overrides::default()
    };
    tweak(&mut overrides);
    Config::resolve(None, overrides).expect("valid test config")
}

async fn run_arena(cfg: Config) -> anyhow::Result<TestReport> {
    match timeout(RUN_WAIT, Arena::new(cfg).run()).await {
        Ok(report) => Ok(report),
        Err(_) => anyhow::bail!("arena did not finish in {RUN_WAIT:?}"),
    }
}

fn total_errors(report: &TestReport) -> u64 {
    ErrorKind::ALL
        .iter()
        .map(|kind| report.overall.error_count(*kind))
        .sum()
}

#[tokio::test]
async fn byte_cap_disconnects_without_recording_an_error() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let cfg = config_for(server.url_for("/data/65536"), |o| {
        o.recvlen = Some(64);
    });

    let report = run_arena(cfg).await?;
    server.shutdown().await;

    anyhow::ensure!(!report.interrupted);
    anyhow::ensure!(
        total_errors(&report) == 0,
        "cap-terminated runs must not count errors"
    );
    anyhow::ensure!(report.per_url.len() == 1);

    let sum = &report.per_url[0].summary;
    anyhow::ensure!(sum.connecting().seen(), "connect gauge never updated");
    anyhow::ensure!(sum.recv_header().seen(), "recvhdr gauge never updated");
    anyhow::ensure!(sum.first_chunk().seen(), "first-chunk gauge never updated");
    anyhow::ensure!(
        report.overall.connecting().seen(),
        "overall summary missed the session"
    );
    Ok(())
}

#[tokio::test]
async fn zero_cap_terminates_right_after_the_first_chunk() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let cfg = config_for(server.url_for("/data/5000000"), |o| {
        o.recvlen = Some(0);
    });

    let started = Instant::now();
    let report = run_arena(cfg).await?;
    server.shutdown().await;

    anyhow::ensure!(total_errors(&report) == 0);
    anyhow::ensure!(report.per_url[0].summary.first_chunk().seen());
    // The first TotalBytes report (16 bytes) already exceeds the cap.
    anyhow::ensure!(
        started.elapsed() < Duration::from_secs(10),
        "zero cap should cut the download short"
    );
    Ok(())
}

#[tokio::test]
async fn early_eof_is_counted_once_per_finished_session() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let cfg = config_for(server.url_for("/data/1000"), |o| {
        o.clients = Some(3);
    });

    let report = run_arena(cfg).await?;
    server.shutdown().await;

    // 1000 bytes ends long before the default 8 MiB cap.
    anyhow::ensure!(report.overall.error_count(ErrorKind::EarlyEof) == 3);
    anyhow::ensure!(report.per_url[0].summary.error_count(ErrorKind::EarlyEof) == 3);
    anyhow::ensure!(total_errors(&report) == 3);
    Ok(())
}

#[tokio::test]
async fn launches_are_paced_by_the_configured_interval() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let cfg = config_for(server.url_for("/data/1000"), |o| {
        o.clients = Some(3);
        o.interval = Some(100_000);
    });

    let started = Instant::now();
    let report = run_arena(cfg).await?;
    let elapsed = started.elapsed();
    server.shutdown().await;

    // Session 2 may not launch before start + 2 * 100 ms.
    anyhow::ensure!(
        elapsed >= Duration::from_millis(200),
        "launches were not paced: {elapsed:?}"
    );
    anyhow::ensure!(report.overall.error_count(ErrorKind::EarlyEof) == 3);
    Ok(())
}

#[tokio::test]
async fn urls_are_cycled_and_aggregated_separately() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let good = server.url_for("/data/1000");
    let missing = server.url_for("/missing");
    let cfg = config_for(format!("{good},{missing}"), |o| {
        o.clients = Some(2);
    });

    let report = run_arena(cfg).await?;
    server.shutdown().await;

    anyhow::ensure!(report.per_url.len() == 2, "expected both urls tested");
    anyhow::ensure!(report.per_url[0].url.as_ref() == good);
    anyhow::ensure!(report.per_url[1].url.as_ref() == missing);

    anyhow::ensure!(report.per_url[0].summary.error_count(ErrorKind::EarlyEof) == 1);
    anyhow::ensure!(report.per_url[0].summary.error_count(ErrorKind::BadHttp) == 0);
    anyhow::ensure!(report.per_url[1].summary.error_count(ErrorKind::BadHttp) == 1);
    anyhow::ensure!(report.per_url[1].summary.error_count(ErrorKind::EarlyEof) == 0);

    anyhow::ensure!(report.overall.error_count(ErrorKind::EarlyEof) == 1);
    anyhow::ensure!(report.overall.error_count(ErrorKind::BadHttp) == 1);
    Ok(())
}

#[tokio::test]
async fn detail_mode_records_series_for_urls_but_not_overall() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let cfg = config_for(server.url_for("/data/1000"), |o| {
        o.clients = Some(2);
        o.detail = true;
    });

    let report = run_arena(cfg).await?;
    server.shutdown().await;

    let mut per_url_csv = Vec::new();
    report.per_url[0].summary.write_csv(&mut per_url_csv)?;
    let per_url_csv = String::from_utf8(per_url_csv)?;
    // Header plus one sample row per session.
    anyhow::ensure!(
        per_url_csv.lines().count() == 3,
        "expected two detail rows, got:\n{per_url_csv}"
    );

    let mut overall_csv = Vec::new();
    report.overall.write_csv(&mut overall_csv)?;
    let overall_csv = String::from_utf8(overall_csv)?;
    anyhow::ensure!(
        overall_csv.lines().count() == 1,
        "overall summary must not record series, got:\n{overall_csv}"
    );
    Ok(())
}

#[tokio::test]
async fn watchdog_timeouts_are_counted_in_the_report() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let cfg = config_for(server.url_for(pullr_testserver::PATH_STALL), |o| {
        o.timeout = Some(1);
    });

    let report = run_arena(cfg).await?;
    server.shutdown().await;

    anyhow::ensure!(report.overall.error_count(ErrorKind::TimeoutForNoData) == 1);
    anyhow::ensure!(total_errors(&report) == 1);
    Ok(())
}
