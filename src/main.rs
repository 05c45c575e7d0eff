use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, Message, MessageId};
use tokio::sync::Mutex;

mod anilist;
mod callback_handlers;
mod errors;
mod helpers;
mod lookup;
mod message_handlers;
mod reactions;
mod scheduler;
mod sessions;
mod store;

use anilist::{
    fetch_media, fetch_user, scrape_list, AniListClient, GraphQlClient, MediaSummary,
    ScrapeOptions, DEFAULT_API_URL,
};
use errors::BotError;
use helpers::*;
use lookup::{lookup_link, MediaLinkMatcher, UserMediaRow, DEFAULT_LINK_PATTERN};
use reactions::{route_reaction, sweep_expired, RenderRequest, RenderUpdate};
use scheduler::{start_poll_loop, start_save_loop, start_session_sweep};
use sessions::{Navigation, PageView, SessionId, SessionTracker};
use store::{
    save_users, ListEntry, ListStats, MediaKind, MediaListStatus, RegisteredUser, UserStore,
};

const USERS_FILE: &str = "users.json";
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
enum TokenInput {
    Value(String),
    File { file: PathBuf },
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    token: TokenInput,
    data_dir: PathBuf,
    api_url: Option<String>,
    page_size: Option<usize>,
    per_chunk: Option<u32>,
    chunk_delay_seconds: Option<u64>,
    user_delay_seconds: Option<u64>,
    cycle_delay_seconds: Option<u64>,
    save_interval_seconds: Option<u64>,
    session_ttl_seconds: Option<u64>,
    sweep_interval_seconds: Option<u64>,
    link_pattern: Option<String>,
}

#[derive(Debug, Clone)]
struct Config {
    token: String,
    data_dir: PathBuf,
    api_url: String,
    page_size: usize,
    scrape: ScrapeOptions,
    user_delay: Duration,
    cycle_delay: Duration,
    save_interval: Duration,
    session_ttl: Duration,
    sweep_interval: Duration,
    link_pattern: String,
}

#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    config: PathBuf,
}

struct AppState {
    config: Config,
    client: std::sync::Arc<dyn GraphQlClient>,
    links: MediaLinkMatcher,
    users: Mutex<UserStore>,
    sessions: Mutex<SessionTracker>,
    scrape_requests: tokio::sync::mpsc::UnboundedSender<u64>,
}

impl AppState {
    fn new(
        config: Config,
        client: std::sync::Arc<dyn GraphQlClient>,
        users: UserStore,
    ) -> Result<(Self, tokio::sync::mpsc::UnboundedReceiver<u64>)> {
        let links = MediaLinkMatcher::new(&config.link_pattern)?;
        let sessions = SessionTracker::new(config.page_size, config.session_ttl);
        let (scrape_requests, requests_rx) = tokio::sync::mpsc::unbounded_channel();
        let state = AppState {
            config,
            client,
            links,
            users: Mutex::new(users),
            sessions: Mutex::new(sessions),
            scrape_requests,
        };
        Ok((state, requests_rx))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = load_config(&args.config)?;
    fs::create_dir_all(&config.data_dir).context("create data_dir")?;

    let users = UserStore::load(&config.data_dir.join(USERS_FILE))?;
    info!("loaded {} linked user(s)", users.len());

    let client: std::sync::Arc<dyn GraphQlClient> =
        std::sync::Arc::new(AniListClient::new(&config.api_url));
    let (state, requests) = AppState::new(config.clone(), client, users)?;
    let state = std::sync::Arc::new(state);

    let bot = Bot::new(config.token.clone());

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let poller = start_poll_loop(state.clone(), requests, shutdown_rx.clone());
    let saver = start_save_loop(state.clone(), shutdown_rx.clone());
    let sweeper = start_session_sweep(bot.clone(), state.clone(), shutdown_rx);

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(message_handlers::handle_message))
        .branch(Update::filter_callback_query().endpoint(callback_handlers::handle_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("shutting down");
    let _ = shutdown_tx.send(true);
    // A scrape in flight only notices shutdown at its next wait.
    let poller_abort = poller.abort_handle();
    if tokio::time::timeout(SHUTDOWN_GRACE, poller).await.is_err() {
        warn!("poller still busy after {:?}; aborting", SHUTDOWN_GRACE);
        poller_abort.abort();
    }
    if let Err(err) = sweeper.await {
        error!("session sweep failed: {:#}", err);
    }
    saver.await.context("wait for final save")?;

    Ok(())
}
