use super::*;

use regex::Regex;

pub(crate) const DEFAULT_LINK_PATTERN: &str = r"https?://(?:www\.)?anilist\.co/(anime|manga)/(\d+)";

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MediaLink {
    pub(crate) kind: MediaKind,
    pub(crate) id: u64,
    pub(crate) url: String,
}

/// Finds media links in chat text. Group 1 is the kind, group 2 the numeric id.
#[derive(Debug, Clone)]
pub(crate) struct MediaLinkMatcher {
    pattern: Regex,
}

impl MediaLinkMatcher {
    pub(crate) fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .with_context(|| format!("compile link pattern {}", pattern))?;
        if pattern.captures_len() < 3 {
            return Err(anyhow!("link pattern needs a kind group and an id group"));
        }
        Ok(MediaLinkMatcher { pattern })
    }

    pub(crate) fn find(&self, text: &str) -> Option<MediaLink> {
        self.pattern.captures_iter(text).find_map(|caps| {
            let kind = MediaKind::from_path(caps.get(1)?.as_str())?;
            let id = caps.get(2)?.as_str().parse().ok()?;
            Some(MediaLink {
                kind,
                id,
                url: caps.get(0)?.as_str().to_string(),
            })
        })
    }
}

/// One line of a summary card: how a linked user tracks the media.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct UserMediaRow {
    pub(crate) user_id: u64,
    pub(crate) name: String,
    pub(crate) status: Option<MediaListStatus>,
    pub(crate) progress: Option<u32>,
    pub(crate) score: Option<f32>,
}

pub(crate) fn rows_for_media(
    users: &[RegisteredUser],
    kind: MediaKind,
    media_id: u64,
) -> Vec<UserMediaRow> {
    users
        .iter()
        .filter_map(|user| {
            let entry = user.find_entry(kind, media_id)?;
            Some(UserMediaRow {
                user_id: user.id,
                name: user.name.clone(),
                status: entry.status,
                progress: entry.progress,
                score: entry.score,
            })
        })
        .collect()
}

#[derive(Debug, Clone)]
pub(crate) struct LookupResult {
    pub(crate) media: MediaSummary,
    pub(crate) rows: Vec<UserMediaRow>,
}

pub(crate) async fn lookup_link<C: GraphQlClient + ?Sized>(
    client: &C,
    users: &Mutex<UserStore>,
    link: &MediaLink,
) -> std::result::Result<LookupResult, BotError> {
    let media = fetch_media(client, link.kind, link.id).await?;
    let rows = {
        let store = users.lock().await;
        rows_for_media(store.users(), link.kind, link.id)
    };
    Ok(LookupResult { media, rows })
}
