use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant, sleep_until};

use crate::config::Config;
use crate::kind::ErrorKind;
use crate::session::{EventSender, Session, SessionEvent, SessionHandle, SessionId};
use crate::summary::Summary;

/// Results for one URL, in first-launch order.
#[derive(Debug)]
pub struct UrlStats {
    pub url: Arc<str>,
    pub summary: Summary,
}

/// Outcome of a whole run.
#[derive(Debug)]
pub struct TestReport {
    pub overall: Summary,
    pub per_url: Vec<UrlStats>,
    pub interrupted: bool,
}

struct SessionEntry {
    handle: SessionHandle,
    slot: usize,
    terminated: bool,
}

type SessionTable = Arc<Mutex<HashMap<SessionId, SessionEntry>>>;

/// Supervises a run: launches sessions on the configured pace, serializes
/// their events into the per-URL and overall summaries, enforces the byte
/// cap, and stops when every session terminated or on SIGINT/SIGTERM.
pub struct Arena {
    cfg: Config,
}

impl Arena {
    #[must_use]
    pub fn new(cfg: Config) -> Self {
        Self { cfg }
    }

    pub async fn run(self) -> TestReport {
        let cfg = self.cfg;

        let mut overall = Summary::default();
        let mut per_url: Vec<UrlStats> = cfg
            .targets()
            .iter()
            .map(|target| UrlStats {
                url: target.raw(),
                summary: Summary::default(),
            })
            .collect();

        let (events, mut rx) = mpsc::unbounded_channel();
        let table: SessionTable = Arc::new(Mutex::new(HashMap::new()));
        let interrupted = Arc::new(AtomicBool::new(false));

        // The launcher keeps its event sender alive until every session is
        // dispatched, so the loop below cannot observe a closed channel while
        // launches are still pending.
        let launcher = tokio::spawn(launch_all(
            cfg.clone(),
            events,
            table.clone(),
            interrupted.clone(),
        ));

        let mut remaining = cfg.clients();
        let mut was_interrupted = false;

        let signal = shutdown_signal();
        tokio::pin!(signal);

        while remaining > 0 {
            tokio::select! {
                _ = &mut signal => {
                    println!("\nInterrupting test loop");
                    interrupted.store(true, Ordering::Relaxed);
                    was_interrupted = true;
                    break;
                }
                received = rx.recv() => {
                    // A closed channel means every sender is gone; nothing
                    // further can arrive.
                    let Some((id, event)) = received else { break };
                    dispatch(
                        &cfg,
                        &table,
                        &mut per_url,
                        &mut overall,
                        &mut remaining,
                        id,
                        event,
                    );
                }
            }
        }

        launcher.abort();
        let table = table.lock();
        for entry in table.values() {
            entry.handle.disconnect();
        }

        // Only report URLs that actually had a session launched at them.
        let mut used = vec![false; per_url.len()];
        for entry in table.values() {
            used[entry.slot] = true;
        }
        let per_url = per_url
            .into_iter()
            .zip(used)
            .filter_map(|(stats, used)| used.then_some(stats))
            .collect();

        TestReport {
            overall,
            per_url,
            interrupted: was_interrupted,
        }
    }
}

fn dispatch(
    cfg: &Config,
    table: &SessionTable,
    per_url: &mut [UrlStats],
    overall: &mut Summary,
    remaining: &mut usize,
    id: SessionId,
    event: SessionEvent,
) {
    let mut table = table.lock();
    let Some(entry) = table.get_mut(&id) else {
        return;
    };
    // Disconnect races: a session may have emitted a few more events before
    // observing its cancellation. They no longer count.
    if entry.terminated {
        return;
    }

    let detail = cfg.detailed();
    let url_summary = &mut per_url[entry.slot].summary;

    match event {
        SessionEvent::Resolved { ms } => {
            url_summary.update_resolving(ms, detail);
            overall.update_resolving(ms, false);
        }
        SessionEvent::Connected { ms } => {
            url_summary.update_connecting(ms, detail);
            overall.update_connecting(ms, false);
        }
        SessionEvent::RecvHeader { ms } => {
            url_summary.update_recv_header(ms, detail);
            overall.update_recv_header(ms, false);
        }
        SessionEvent::FirstChunk { ms } => {
            url_summary.update_first_chunk(ms, detail);
            overall.update_first_chunk(ms, false);
        }
        SessionEvent::Content { bytes, ms } => {
            url_summary.update_throughput(bytes, ms);
            overall.update_throughput(bytes, ms);
        }
        SessionEvent::TotalBytes { total } => {
            if total >= cfg.max_recv_length() {
                terminate(entry, remaining);
            }
        }
        SessionEvent::Finished => {
            // End-of-stream before the cap; counted, not celebrated.
            url_summary.record_error(ErrorKind::EarlyEof);
            overall.record_error(ErrorKind::EarlyEof);
            terminate(entry, remaining);
        }
        SessionEvent::Failed(kind) => {
            url_summary.record_error(kind);
            overall.record_error(kind);
            terminate(entry, remaining);
        }
    }
}

fn terminate(entry: &mut SessionEntry, remaining: &mut usize) {
    entry.terminated = true;
    entry.handle.disconnect();
    *remaining = remaining.saturating_sub(1);
}

async fn launch_all(
    cfg: Config,
    events: EventSender,
    table: SessionTable,
    interrupted: Arc<AtomicBool>,
) {
    let started = Instant::now();
    let step_us = cfg.interval().as_micros().min(u64::MAX as u128) as u64;
    let mut cursor = cfg.cursor();

    for i in 0..cfg.clients() {
        if interrupted.load(Ordering::Relaxed) {
            return;
        }

        let due = started + Duration::from_micros(step_us.saturating_mul(i as u64));
        if Instant::now() < due {
            sleep_until(due).await;
            if interrupted.load(Ordering::Relaxed) {
                return;
            }
        }

        let (slot, target) = cursor.next_target();
        let id = i as SessionId;
        let handle = SessionHandle::new();

        // Register before spawning so the dispatch loop always knows the
        // session when its first event arrives.
        table.lock().insert(
            id,
            SessionEntry {
                handle: handle.clone(),
                slot,
                terminated: false,
            },
        );
        Session::spawn(id, &target, cfg.timeout(), events.clone(), handle);
    }

    println!("please wait ...");
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
