use super::*;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum MediaKind {
    Anime,
    Manga,
}

impl MediaKind {
    pub(crate) const ALL: [MediaKind; 2] = [MediaKind::Anime, MediaKind::Manga];

    pub(crate) fn as_api(self) -> &'static str {
        match self {
            MediaKind::Anime => "ANIME",
            MediaKind::Manga => "MANGA",
        }
    }

    pub(crate) fn from_path(segment: &str) -> Option<Self> {
        match segment.to_ascii_lowercase().as_str() {
            "anime" => Some(MediaKind::Anime),
            "manga" => Some(MediaKind::Manga),
            _ => None,
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            MediaKind::Anime => "Anime",
            MediaKind::Manga => "Manga",
        }
    }

    fn progress_unit(self) -> &'static str {
        match self {
            MediaKind::Anime => "episodes watched",
            MediaKind::Manga => "chapters read",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum MediaListStatus {
    Current,
    Planning,
    Completed,
    Dropped,
    Paused,
    Repeating,
    #[serde(other)]
    Unknown,
}

impl MediaListStatus {
    pub(crate) fn label(self, kind: MediaKind) -> &'static str {
        match (self, kind) {
            (MediaListStatus::Current, MediaKind::Anime) => "Watching",
            (MediaListStatus::Current, MediaKind::Manga) => "Reading",
            (MediaListStatus::Repeating, MediaKind::Anime) => "Rewatching",
            (MediaListStatus::Repeating, MediaKind::Manga) => "Rereading",
            (MediaListStatus::Planning, _) => "Planning",
            (MediaListStatus::Completed, _) => "Completed",
            (MediaListStatus::Dropped, _) => "Dropped",
            (MediaListStatus::Paused, _) => "Paused",
            (MediaListStatus::Unknown, _) => "Unknown",
        }
    }
}

/// One scraped list row. Never edited in place; a scrape replaces the whole list.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct ListEntry {
    pub(crate) media_id: u64,
    #[serde(default)]
    pub(crate) status: Option<MediaListStatus>,
    #[serde(default)]
    pub(crate) progress: Option<u32>,
    #[serde(default)]
    pub(crate) score: Option<f32>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct RegisteredUser {
    pub(crate) id: u64,
    pub(crate) name: String,
    pub(crate) anilist_name: String,
    #[serde(default)]
    pub(crate) anime: Vec<ListEntry>,
    #[serde(default)]
    pub(crate) manga: Vec<ListEntry>,
    #[serde(default)]
    pub(crate) scraped_at: Option<DateTime<Utc>>,
}

impl RegisteredUser {
    pub(crate) fn new(id: u64, name: &str, anilist_name: &str) -> Self {
        RegisteredUser {
            id,
            name: name.to_string(),
            anilist_name: anilist_name.to_string(),
            anime: Vec::new(),
            manga: Vec::new(),
            scraped_at: None,
        }
    }

    pub(crate) fn entries(&self, kind: MediaKind) -> &[ListEntry] {
        match kind {
            MediaKind::Anime => &self.anime,
            MediaKind::Manga => &self.manga,
        }
    }

    fn entries_mut(&mut self, kind: MediaKind) -> &mut Vec<ListEntry> {
        match kind {
            MediaKind::Anime => &mut self.anime,
            MediaKind::Manga => &mut self.manga,
        }
    }

    pub(crate) fn find_entry(&self, kind: MediaKind, media_id: u64) -> Option<&ListEntry> {
        self.entries(kind).iter().find(|e| e.media_id == media_id)
    }

    pub(crate) fn profile_url(&self) -> String {
        format!("https://anilist.co/user/{}", self.anilist_name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ListStats {
    pub(crate) count: usize,
    pub(crate) mean_score: Option<f32>,
    pub(crate) total_progress: u64,
}

impl ListStats {
    pub(crate) fn from_entries(entries: &[ListEntry]) -> Self {
        let scores: Vec<f32> = entries.iter().filter_map(|e| e.score).collect();
        let mean_score = if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f32>() / scores.len() as f32)
        };
        ListStats {
            count: entries.len(),
            mean_score,
            total_progress: entries
                .iter()
                .filter_map(|e| e.progress)
                .map(u64::from)
                .sum(),
        }
    }

    pub(crate) fn describe(&self, kind: MediaKind) -> String {
        let mut text = format!("{}: {} entries", kind.label(), self.count);
        if let Some(mean) = self.mean_score {
            text.push_str(&format!(", mean score {:.1}", mean));
        }
        text.push_str(&format!(", {} {}", self.total_progress, kind.progress_unit()));
        text
    }
}

/// Linked users in registration order. `id` is the uniqueness key.
pub(crate) struct UserStore {
    path: PathBuf,
    users: Vec<RegisteredUser>,
}

impl UserStore {
    pub(crate) fn new(path: PathBuf) -> Self {
        UserStore {
            path,
            users: Vec::new(),
        }
    }

    pub(crate) fn load(path: &Path) -> Result<Self> {
        let mut store = UserStore::new(path.to_path_buf());
        if path.exists() {
            let data = fs::read_to_string(path)
                .with_context(|| format!("read users {}", path.display()))?;
            store.users = serde_json::from_str(&data).context("parse users")?;
        }
        Ok(store)
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn users(&self) -> &[RegisteredUser] {
        &self.users
    }

    pub(crate) fn len(&self) -> usize {
        self.users.len()
    }

    pub(crate) fn get(&self, id: u64) -> Option<&RegisteredUser> {
        self.users.iter().find(|u| u.id == id)
    }

    pub(crate) fn find_by_name(&self, name: &str) -> Option<&RegisteredUser> {
        let needle = name.trim().trim_start_matches('@');
        self.users.iter().find(|u| {
            u.name.eq_ignore_ascii_case(needle) || u.anilist_name.eq_ignore_ascii_case(needle)
        })
    }

    pub(crate) fn add(&mut self, user: RegisteredUser) -> std::result::Result<(), BotError> {
        if self.get(user.id).is_some() {
            return Err(BotError::already_exists("user", user.id));
        }
        self.users.push(user);
        Ok(())
    }

    pub(crate) fn remove(&mut self, id: u64) -> std::result::Result<RegisteredUser, BotError> {
        let pos = self
            .users
            .iter()
            .position(|u| u.id == id)
            .ok_or_else(|| BotError::not_found("user", id))?;
        Ok(self.users.remove(pos))
    }

    /// `(id, anilist_name)` pairs in registration order.
    pub(crate) fn snapshot(&self) -> Vec<(u64, String)> {
        self.users
            .iter()
            .map(|u| (u.id, u.anilist_name.clone()))
            .collect()
    }

    pub(crate) fn replace_entries(
        &mut self,
        id: u64,
        kind: MediaKind,
        entries: Vec<ListEntry>,
    ) -> std::result::Result<(), BotError> {
        let user = self
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| BotError::not_found("user", id))?;
        *user.entries_mut(kind) = entries;
        user.scraped_at = Some(Utc::now());
        Ok(())
    }
}

pub(crate) fn save_users(path: &Path, users: &[RegisteredUser]) -> Result<()> {
    let data = serde_json::to_vec_pretty(users).context("serialize users")?;
    atomic_write(path, &data)
}
