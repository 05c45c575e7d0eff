//! AniList GraphQL access: the transport seam, list scraping and one-off lookups.

use super::*;

use async_trait::async_trait;
use serde_json::{json, Value};

pub(crate) const DEFAULT_API_URL: &str = "https://graphql.anilist.co";
const FIRST_CHUNK: u32 = 1;

const MEDIA_LIST_QUERY: &str = "query ($userName: String, $type: MediaType, $perChunk: Int, $chunk: Int) {
  MediaListCollection(userName: $userName, type: $type, perChunk: $perChunk, chunk: $chunk) {
    hasNextChunk
    lists {
      entries {
        mediaId
        status
        progress
        score(format: POINT_10)
      }
    }
  }
}";

const USER_QUERY: &str = "query ($name: String) {
  User(name: $name) {
    name
    siteUrl
  }
}";

const MEDIA_QUERY: &str = "query ($id: Int, $type: MediaType) {
  Media(id: $id, type: $type) {
    id
    type
    title {
      romaji
      english
      native
    }
    description(asHtml: false)
    coverImage {
      large
    }
    averageScore
    siteUrl
  }
}";

/// Executes one GraphQL request and hands back its `data` object.
#[async_trait]
pub(crate) trait GraphQlClient: Send + Sync {
    async fn execute(&self, query: &str, variables: Value) -> std::result::Result<Value, BotError>;
}

pub(crate) struct AniListClient {
    client: reqwest::Client,
    api_url: String,
}

impl AniListClient {
    pub(crate) fn new(api_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize, Debug)]
struct GraphQlError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<u16>,
}

#[async_trait]
impl GraphQlClient for AniListClient {
    async fn execute(&self, query: &str, variables: Value) -> std::result::Result<Value, BotError> {
        let body = json!({
            "query": query,
            "variables": variables,
        });
        let resp = self.client.post(&self.api_url).json(&body).send().await?;
        let status = resp.status();
        let payload: GraphQlResponse = resp.json().await?;

        if let Some(err) = payload.errors.first() {
            if err.status == Some(404) || status == reqwest::StatusCode::NOT_FOUND {
                return Err(BotError::not_found("anilist resource", &err.message));
            }
            return Err(BotError::transient(format!(
                "anilist error ({}): {}",
                status, err.message
            )));
        }
        if !status.is_success() {
            return Err(BotError::transient(format!("anilist returned {}", status)));
        }
        payload
            .data
            .ok_or_else(|| BotError::transient("anilist response without data"))
    }
}

#[derive(Clone, Debug)]
pub(crate) struct ScrapeOptions {
    pub(crate) per_chunk: u32,
    pub(crate) chunk_delay: Duration,
}

#[derive(Deserialize, Debug)]
struct MediaListCollectionData {
    #[serde(rename = "MediaListCollection")]
    collection: Option<MediaListCollection>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct MediaListCollection {
    #[serde(default)]
    has_next_chunk: Option<bool>,
    #[serde(default)]
    lists: Option<Vec<Option<MediaListGroup>>>,
}

#[derive(Deserialize, Debug)]
struct MediaListGroup {
    #[serde(default)]
    entries: Option<Vec<Option<RawListEntry>>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RawListEntry {
    media_id: u64,
    #[serde(default)]
    status: Option<MediaListStatus>,
    #[serde(default)]
    progress: Option<u32>,
    #[serde(default)]
    score: Option<f32>,
}

impl From<RawListEntry> for ListEntry {
    fn from(raw: RawListEntry) -> Self {
        ListEntry {
            media_id: raw.media_id,
            status: raw.status,
            progress: raw.progress,
            // AniList reports 0 for "not scored".
            score: raw.score.filter(|s| *s > 0.0),
        }
    }
}

/// Walks a user's list chunk by chunk until AniList reports no further chunk.
///
/// A chunk with no sub-lists ends the walk even when `hasNextChunk` says otherwise.
pub(crate) async fn scrape_list<C: GraphQlClient + ?Sized>(
    client: &C,
    username: &str,
    kind: MediaKind,
    options: &ScrapeOptions,
) -> std::result::Result<Vec<ListEntry>, BotError> {
    let mut entries = Vec::new();
    let mut chunk = FIRST_CHUNK;

    loop {
        let variables = json!({
            "userName": username,
            "type": kind.as_api(),
            "perChunk": options.per_chunk,
            "chunk": chunk,
        });
        let data = client.execute(MEDIA_LIST_QUERY, variables).await?;
        let page: MediaListCollectionData = serde_json::from_value(data)?;
        let collection = page
            .collection
            .ok_or_else(|| BotError::not_found("anilist user", username))?;

        let lists: Vec<MediaListGroup> = collection
            .lists
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .collect();
        if lists.is_empty() {
            debug!("{} {} chunk {} has no lists; stopping", username, kind.as_api(), chunk);
            break;
        }
        for list in lists {
            entries.extend(
                list.entries
                    .unwrap_or_default()
                    .into_iter()
                    .flatten()
                    .map(ListEntry::from),
            );
        }
        debug!(
            "{} {} chunk {} done, {} entries so far",
            username,
            kind.as_api(),
            chunk,
            entries.len()
        );

        if !collection.has_next_chunk.unwrap_or(false) {
            break;
        }
        chunk += 1;
        tokio::time::sleep(options.chunk_delay).await;
    }

    Ok(entries)
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AniListUser {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) site_url: Option<String>,
}

#[derive(Deserialize, Debug)]
struct UserData {
    #[serde(rename = "User")]
    user: Option<AniListUser>,
}

pub(crate) async fn fetch_user<C: GraphQlClient + ?Sized>(
    client: &C,
    name: &str,
) -> std::result::Result<AniListUser, BotError> {
    let data = client.execute(USER_QUERY, json!({ "name": name })).await?;
    let data: UserData = serde_json::from_value(data)?;
    data.user
        .ok_or_else(|| BotError::not_found("anilist user", name))
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub(crate) struct MediaTitle {
    #[serde(default)]
    pub(crate) romaji: Option<String>,
    #[serde(default)]
    pub(crate) english: Option<String>,
    #[serde(default)]
    pub(crate) native: Option<String>,
}

impl MediaTitle {
    pub(crate) fn preferred(&self) -> &str {
        self.english
            .as_deref()
            .or(self.romaji.as_deref())
            .or(self.native.as_deref())
            .unwrap_or("Untitled")
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
struct CoverImage {
    #[serde(default)]
    large: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RawMedia {
    id: u64,
    #[serde(rename = "type")]
    kind: MediaKind,
    #[serde(default)]
    title: Option<MediaTitle>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    cover_image: Option<CoverImage>,
    #[serde(default)]
    average_score: Option<u32>,
    #[serde(default)]
    site_url: Option<String>,
}

#[derive(Deserialize, Debug)]
struct MediaData {
    #[serde(rename = "Media")]
    media: Option<RawMedia>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MediaSummary {
    pub(crate) id: u64,
    pub(crate) kind: MediaKind,
    pub(crate) title: MediaTitle,
    pub(crate) description: Option<String>,
    pub(crate) cover_image: Option<String>,
    pub(crate) average_score: Option<u32>,
    pub(crate) site_url: String,
}

impl From<RawMedia> for MediaSummary {
    fn from(raw: RawMedia) -> Self {
        let site_url = raw.site_url.unwrap_or_else(|| {
            format!(
                "https://anilist.co/{}/{}",
                raw.kind.label().to_ascii_lowercase(),
                raw.id
            )
        });
        MediaSummary {
            id: raw.id,
            kind: raw.kind,
            title: raw.title.unwrap_or_default(),
            description: raw.description,
            cover_image: raw.cover_image.and_then(|c| c.large),
            average_score: raw.average_score,
            site_url,
        }
    }
}

pub(crate) async fn fetch_media<C: GraphQlClient + ?Sized>(
    client: &C,
    kind: MediaKind,
    id: u64,
) -> std::result::Result<MediaSummary, BotError> {
    let variables = json!({ "id": id, "type": kind.as_api() });
    let data = client.execute(MEDIA_QUERY, variables).await?;
    let data: MediaData = serde_json::from_value(data)?;
    data.media
        .map(MediaSummary::from)
        .ok_or_else(|| BotError::not_found("media", id))
}
