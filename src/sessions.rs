use super::*;

/// The rendered message that backs a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SessionId {
    pub(crate) chat_id: i64,
    pub(crate) message_id: i32,
}

impl SessionId {
    pub(crate) fn new(chat_id: ChatId, message_id: MessageId) -> Self {
        SessionId {
            chat_id: chat_id.0,
            message_id: message_id.0,
        }
    }

    pub(crate) fn chat(&self) -> ChatId {
        ChatId(self.chat_id)
    }

    pub(crate) fn message(&self) -> MessageId {
        MessageId(self.message_id)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PaginatedSession {
    pub(crate) id: SessionId,
    pub(crate) owner: u64,
    pub(crate) page: usize,
    pub(crate) rows: Vec<UserMediaRow>,
    pub(crate) media: MediaSummary,
    pub(crate) media_link: String,
    pub(crate) created_at: Instant,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PageView {
    pub(crate) media: MediaSummary,
    pub(crate) media_link: String,
    pub(crate) rows: Vec<UserMediaRow>,
    pub(crate) total_rows: usize,
    pub(crate) page: usize,
    pub(crate) page_count: usize,
}

impl PageView {
    pub(crate) fn new(
        media: &MediaSummary,
        media_link: &str,
        rows: &[UserMediaRow],
        page: usize,
        page_size: usize,
    ) -> Self {
        let start = page * page_size;
        PageView {
            media: media.clone(),
            media_link: media_link.to_string(),
            rows: rows.iter().skip(start).take(page_size).cloned().collect(),
            total_rows: rows.len(),
            page,
            page_count: page_count(rows.len(), page_size),
        }
    }
}

/// Pages needed for `total` rows. An empty card still has one page.
pub(crate) fn page_count(total: usize, page_size: usize) -> usize {
    if total == 0 || page_size == 0 {
        1
    } else {
        (total + page_size - 1) / page_size
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Navigation {
    Moved(usize),
    AtBoundary,
    NotOwner,
}

pub(crate) struct SessionTracker {
    sessions: HashMap<SessionId, PaginatedSession>,
    page_size: usize,
    ttl: Duration,
}

impl SessionTracker {
    pub(crate) fn new(page_size: usize, ttl: Duration) -> Self {
        SessionTracker {
            sessions: HashMap::new(),
            page_size: page_size.max(1),
            ttl,
        }
    }

    pub(crate) fn page_size(&self) -> usize {
        self.page_size
    }

    pub(crate) fn len(&self) -> usize {
        self.sessions.len()
    }

    pub(crate) fn get(&self, id: SessionId) -> Option<&PaginatedSession> {
        self.sessions.get(&id)
    }

    pub(crate) fn create(
        &mut self,
        id: SessionId,
        owner: u64,
        rows: Vec<UserMediaRow>,
        media: MediaSummary,
        media_link: &str,
        now: Instant,
    ) -> std::result::Result<(), BotError> {
        if self.sessions.contains_key(&id) {
            return Err(BotError::already_exists(
                "session",
                format!("{}:{}", id.chat_id, id.message_id),
            ));
        }
        self.sessions.insert(
            id,
            PaginatedSession {
                id,
                owner,
                page: 0,
                rows,
                media,
                media_link: media_link.to_string(),
                created_at: now,
            },
        );
        Ok(())
    }

    pub(crate) fn last_page(&self, id: SessionId) -> Option<usize> {
        self.sessions
            .get(&id)
            .map(|s| page_count(s.rows.len(), self.page_size) - 1)
    }

    /// Moves the owner's view by `delta` pages. Moves past either end do nothing.
    pub(crate) fn navigate(
        &mut self,
        id: SessionId,
        requester: u64,
        delta: isize,
    ) -> std::result::Result<Navigation, BotError> {
        let last_page = self
            .last_page(id)
            .ok_or_else(|| BotError::not_found("session", id.message_id))?;
        let Some(session) = self.sessions.get_mut(&id) else {
            return Err(BotError::not_found("session", id.message_id));
        };
        if session.owner != requester {
            return Ok(Navigation::NotOwner);
        }
        let target = session.page as isize + delta;
        if delta == 0 || target < 0 || target as usize > last_page {
            return Ok(Navigation::AtBoundary);
        }
        session.page = target as usize;
        Ok(Navigation::Moved(session.page))
    }

    pub(crate) fn view(&self, id: SessionId) -> Option<PageView> {
        let session = self.get(id)?;
        Some(PageView::new(
            &session.media,
            &session.media_link,
            &session.rows,
            session.page,
            self.page_size,
        ))
    }

    pub(crate) fn dismiss(
        &mut self,
        id: SessionId,
    ) -> std::result::Result<PaginatedSession, BotError> {
        self.sessions
            .remove(&id)
            .ok_or_else(|| BotError::not_found("session", id.message_id))
    }

    /// Dismiss on behalf of `actor`; only the owner may close the card.
    pub(crate) fn dismiss_by(
        &mut self,
        id: SessionId,
        actor: u64,
    ) -> std::result::Result<PaginatedSession, BotError> {
        match self.sessions.get(&id) {
            None => Err(BotError::not_found("session", id.message_id)),
            Some(session) if session.owner != actor => Err(BotError::Unauthorized),
            Some(_) => self.dismiss(id),
        }
    }

    pub(crate) fn expire(&mut self, id: SessionId) -> Option<PaginatedSession> {
        self.sessions.remove(&id)
    }

    /// Sessions whose TTL, counted from creation, has run out at `now`.
    pub(crate) fn expired(&self, now: Instant) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|s| now.saturating_duration_since(s.created_at) >= self.ttl)
            .map(|s| s.id)
            .collect();
        ids.sort_by_key(|id| (id.chat_id, id.message_id));
        ids
    }
}
