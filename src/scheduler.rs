//! Background work: the list poller, the periodic flush of `users.json`, and the
//! session sweep. Each loop stops at its next wait once shutdown is signalled.

use super::*;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

const MIN_EMPTY_WAIT: Duration = Duration::from_secs(1);

#[derive(Debug, Default, PartialEq)]
pub(crate) struct RefreshReport {
    pub(crate) updated: Vec<(MediaKind, usize)>,
    pub(crate) failed: Vec<MediaKind>,
}

/// Scrapes every category for one user. Successful categories replace the cache;
/// failed ones keep whatever was there before.
pub(crate) async fn refresh_user(state: &AppState, user_id: u64, username: &str) -> RefreshReport {
    let mut report = RefreshReport::default();
    for kind in MediaKind::ALL {
        match scrape_list(state.client.as_ref(), username, kind, &state.config.scrape).await {
            Ok(entries) => {
                let count = entries.len();
                match state.users.lock().await.replace_entries(user_id, kind, entries) {
                    Ok(()) => report.updated.push((kind, count)),
                    Err(err) => {
                        // Unlinked while we were scraping.
                        debug!("dropping scrape for {}: {}", username, err);
                        return report;
                    }
                }
            }
            Err(err) => {
                warn!("scrape {} {} failed: {}", username, kind.as_api(), err);
                report.failed.push(kind);
            }
        }
    }
    report
}

async fn refresh_requested(state: &AppState, user_id: u64) {
    let username = state
        .users
        .lock()
        .await
        .get(user_id)
        .map(|u| u.anilist_name.clone());
    match username {
        Some(username) => {
            let report = refresh_user(state, user_id, &username).await;
            info!("requested scrape of {}: {:?}", username, report);
        }
        None => debug!("scrape requested for unknown user {}", user_id),
    }
}

/// Waits `duration`, serving scrape requests that arrive meanwhile.
/// Returns `false` once shutdown is signalled.
async fn idle(
    state: &AppState,
    requests: &mut mpsc::UnboundedReceiver<u64>,
    shutdown: &mut watch::Receiver<bool>,
    duration: Duration,
) -> bool {
    let deadline = tokio::time::Instant::now() + duration;
    loop {
        if *shutdown.borrow() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => return true,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return false;
                }
            }
            Some(user_id) = requests.recv() => refresh_requested(state, user_id).await,
        }
    }
}

/// One walk over every linked user. Returns `false` if interrupted by shutdown.
/// With nobody linked the pass is one `user_delay` wait (at least a second).
pub(crate) async fn scrape_pass(
    state: &AppState,
    requests: &mut mpsc::UnboundedReceiver<u64>,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    let users = state.users.lock().await.snapshot();
    if users.is_empty() {
        let wait = state.config.user_delay.max(MIN_EMPTY_WAIT);
        debug!("no linked users; waiting {:?}", wait);
        return idle(state, requests, shutdown, wait).await;
    }
    info!("scrape pass starting for {} user(s)", users.len());
    for (user_id, username) in users {
        let report = refresh_user(state, user_id, &username).await;
        debug!("scraped {}: {:?}", username, report);
        if !idle(state, requests, shutdown, state.config.user_delay).await {
            return false;
        }
    }
    info!("scrape pass finished");
    true
}

pub(crate) async fn run_poll_loop(
    state: std::sync::Arc<AppState>,
    mut requests: mpsc::UnboundedReceiver<u64>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if !scrape_pass(&state, &mut requests, &mut shutdown).await {
            break;
        }
        if !idle(&state, &mut requests, &mut shutdown, state.config.cycle_delay).await {
            break;
        }
    }
    info!("poller stopped");
}

pub(crate) fn start_poll_loop(
    state: std::sync::Arc<AppState>,
    requests: mpsc::UnboundedReceiver<u64>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(run_poll_loop(state, requests, shutdown))
}

pub(crate) async fn save_state(state: &AppState) -> Result<()> {
    let (path, users) = {
        let store = state.users.lock().await;
        (store.path().to_path_buf(), store.users().to_vec())
    };
    save_users(&path, &users)
}

/// Flushes the user store on a timer, and once more on shutdown.
pub(crate) fn start_save_loop(
    state: std::sync::Arc<AppState>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state.config.save_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(err) = save_state(&state).await {
                        error!("saving users failed: {:#}", err);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        if let Err(err) = save_state(&state).await {
            error!("final save failed: {:#}", err);
        }
    })
}

pub(crate) fn start_session_sweep(
    bot: Bot,
    state: std::sync::Arc<AppState>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state.config.sweep_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }
            let requests = {
                let mut sessions = state.sessions.lock().await;
                let requests = sweep_expired(&mut sessions, Instant::now());
                if !requests.is_empty() {
                    debug!("expired {} session(s), {} left", requests.len(), sessions.len());
                }
                requests
            };
            for request in requests {
                if let Err(err) = apply_render(&bot, &request).await {
                    error!("reverting expired card failed: {:#}", err);
                }
            }
        }
    })
}
