use super::*;

const DESCRIPTION_LIMIT: usize = 300;

pub(super) fn help_text() -> &'static str {
    "Link your AniList account and I'll tell the chat who has seen or read the titles people post.\n\n\
     /add <anilist name> - link your AniList account\n\
     /remove - unlink your account\n\
     /profile [name] - show a linked profile (yours, the replied-to user's, or by name)\n\
     /help - this message\n\n\
     Post an anilist.co anime or manga link to see who has it on their list. \
     Use ⬅️ ➡️ to page through the card and ❌ to close it."
}

pub(super) fn load_config(path: &Path) -> Result<Config> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let config_dir = path.parent().unwrap_or_else(|| Path::new("."));
    parse_config(&contents, config_dir)
}

pub(super) fn parse_config(contents: &str, config_dir: &Path) -> Result<Config> {
    let file: ConfigFile = toml::from_str(contents).context("parse config")?;
    let token = match file.token {
        TokenInput::Value(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(anyhow!("token is empty"));
            }
            trimmed.to_string()
        }
        TokenInput::File { file } => read_token_file(&resolve_path(&file, config_dir))?,
    };

    let page_size = file.page_size.unwrap_or(3);
    if page_size == 0 {
        return Err(anyhow!("page_size must be at least 1"));
    }
    let per_chunk = file.per_chunk.unwrap_or(500);
    if per_chunk == 0 || per_chunk > 500 {
        return Err(anyhow!("per_chunk must be between 1 and 500"));
    }

    Ok(Config {
        token,
        data_dir: resolve_path(&file.data_dir, config_dir),
        api_url: file.api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        page_size,
        scrape: ScrapeOptions {
            per_chunk,
            chunk_delay: Duration::from_secs(file.chunk_delay_seconds.unwrap_or(5)),
        },
        user_delay: Duration::from_secs(file.user_delay_seconds.unwrap_or(30)),
        cycle_delay: Duration::from_secs(file.cycle_delay_seconds.unwrap_or(0)),
        save_interval: Duration::from_secs(file.save_interval_seconds.unwrap_or(120).max(1)),
        session_ttl: Duration::from_secs(file.session_ttl_seconds.unwrap_or(15 * 60)),
        sweep_interval: Duration::from_secs(file.sweep_interval_seconds.unwrap_or(30).max(1)),
        link_pattern: file
            .link_pattern
            .unwrap_or_else(|| DEFAULT_LINK_PATTERN.to_string()),
    })
}

pub(super) fn resolve_path(path: &Path, config_dir: &Path) -> PathBuf {
    if path.is_relative() {
        config_dir.join(path)
    } else {
        path.to_path_buf()
    }
}

pub(super) fn read_token_file(path: &Path) -> Result<String> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read token file {}", path.display()))?;
    let token = contents.trim();
    if token.is_empty() {
        return Err(anyhow!("token file {} is empty", path.display()));
    }
    Ok(token.to_string())
}

pub(super) fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| anyhow!("no parent dir for {}", path.display()))?;
    fs::create_dir_all(dir).with_context(|| format!("create dir {}", dir.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("create temp file in {}", dir.display()))?;
    tmp.write_all(data).context("write temp file")?;
    tmp.flush().context("flush temp file")?;
    tmp.as_file_mut().sync_all().context("sync temp file")?;
    tmp.persist(path)
        .map_err(|e| anyhow!("persist temp file: {}", e))?;
    Ok(())
}

pub(super) fn parse_command(text: &str) -> Option<&str> {
    let first = text.split_whitespace().next()?;
    if !first.starts_with('/') {
        return None;
    }
    let cmd = first.trim_start_matches('/');
    Some(cmd.split('@').next().unwrap_or(cmd))
}

pub(super) fn command_args(text: &str) -> &str {
    text.splitn(2, |c: char| c.is_whitespace())
        .nth(1)
        .unwrap_or("")
        .trim()
}

pub(super) fn display_name(user: &teloxide::types::User) -> String {
    match &user.username {
        Some(username) => username.clone(),
        None => user.full_name(),
    }
}

/// Strips markup AniList leaves in descriptions and cuts to `limit` characters.
pub(super) fn plain_description(text: &str, limit: usize) -> String {
    let mut out = String::new();
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    let collapsed = out.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= limit {
        return collapsed;
    }
    let mut cut: String = collapsed.chars().take(limit).collect();
    cut = cut.trim_end().to_string();
    cut.push_str("...");
    cut
}

pub(super) fn format_row(row: &UserMediaRow, kind: MediaKind) -> String {
    let status = row
        .status
        .map(|s| s.label(kind))
        .unwrap_or("No status");
    let mut line = format!("{}: {}", row.name, status);
    if let Some(progress) = row.progress {
        let unit = match kind {
            MediaKind::Anime => "ep",
            MediaKind::Manga => "ch",
        };
        line.push_str(&format!(", {} {}", progress, unit));
    }
    if let Some(score) = row.score {
        line.push_str(&format!(", {}/10", score));
    }
    line
}

pub(super) fn card_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(
            reactions::PREV_GLYPH,
            format!("react:{}", reactions::PREV_GLYPH),
        ),
        InlineKeyboardButton::callback(
            reactions::DISMISS_GLYPH,
            format!("react:{}", reactions::DISMISS_GLYPH),
        ),
        InlineKeyboardButton::callback(
            reactions::NEXT_GLYPH,
            format!("react:{}", reactions::NEXT_GLYPH),
        ),
    ]])
}

pub(super) fn build_card_view(view: &PageView) -> (String, InlineKeyboardMarkup) {
    let media = &view.media;
    let mut text = format!(
        "{} ({})\n{}\n",
        media.title.preferred(),
        media.kind.label(),
        media.site_url
    );
    if let Some(score) = media.average_score {
        text.push_str(&format!("Average score: {}%\n", score));
    }
    if let Some(description) = media.description.as_deref() {
        let description = plain_description(description, DESCRIPTION_LIMIT);
        if !description.is_empty() {
            text.push('\n');
            text.push_str(&description);
            text.push('\n');
        }
    }
    if let Some(cover) = media.cover_image.as_deref() {
        text.push_str(&format!("Cover: {}\n", cover));
    }
    text.push('\n');

    if view.total_rows == 0 {
        text.push_str("Nobody here has this on their list yet.");
    } else {
        text.push_str(&format!(
            "On {} list(s), page {}/{}:\n",
            view.total_rows,
            view.page + 1,
            view.page_count
        ));
        for row in &view.rows {
            text.push_str(&format_row(row, media.kind));
            text.push('\n');
        }
    }

    (text.trim_end().to_string(), card_keyboard())
}

pub(super) fn build_profile_text(user: &RegisteredUser) -> String {
    let mut text = format!("{} on AniList: {}\n", user.name, user.profile_url());
    for kind in MediaKind::ALL {
        text.push_str(&ListStats::from_entries(user.entries(kind)).describe(kind));
        text.push('\n');
    }
    match user.scraped_at {
        Some(at) => text.push_str(&format!("Updated {}", at.format("%Y-%m-%d %H:%M UTC"))),
        None => text.push_str("Lists not loaded yet."),
    }
    text
}

/// Pushes a render request out to the chat.
pub(super) async fn apply_render(bot: &Bot, request: &RenderRequest) -> Result<()> {
    let Some(update) = &request.update else {
        return Ok(());
    };
    let chat_id = request.session.chat();
    let message_id = request.session.message();
    let result = match update {
        RenderUpdate::Page(view) => {
            let (text, kb) = build_card_view(view);
            bot.edit_message_text(chat_id, message_id, text)
                .reply_markup(kb)
                .await
        }
        // Editing without a markup drops the buttons.
        RenderUpdate::Revert { media_link } => {
            bot.edit_message_text(chat_id, message_id, media_link.clone())
                .await
        }
    };
    match result {
        Ok(_) => Ok(()),
        Err(err) if is_message_not_modified_error(&err) => Ok(()),
        Err(err) => Err(err).context("edit card"),
    }
}

pub(super) fn is_message_not_modified_error(err: &teloxide::RequestError) -> bool {
    err.to_string()
        .to_ascii_lowercase()
        .contains("message is not modified")
}

pub(super) async fn send_error(bot: &Bot, chat_id: ChatId, text: &str) -> Result<()> {
    bot.send_message(chat_id, text).await?;
    Ok(())
}
