use super::*;

const UNAVAILABLE_REPLY: &str = "AniList is not reachable right now, try again later.";

pub(super) async fn handle_message(
    bot: Bot,
    msg: Message,
    state: std::sync::Arc<AppState>,
) -> Result<()> {
    let user = match msg.from() {
        Some(user) if !user.is_bot => user.clone(),
        _ => return Ok(()),
    };

    let text = match msg.text().or_else(|| msg.caption()) {
        Some(text) => text.to_string(),
        None => return Ok(()),
    };

    if let Some(cmd) = parse_command(&text) {
        let rest = command_args(&text);
        match cmd.to_ascii_lowercase().as_str() {
            "start" | "help" => {
                bot.send_message(msg.chat.id, help_text()).await?;
                return Ok(());
            }
            "add" | "link" => {
                if rest.is_empty() {
                    send_error(&bot, msg.chat.id, "Provide your AniList username.").await?;
                } else {
                    handle_add_command(&bot, &msg, &user, &state, rest).await?;
                }
                return Ok(());
            }
            "remove" | "unlink" => {
                handle_remove_command(&bot, &msg, &user, &state).await?;
                return Ok(());
            }
            "profile" | "anilist" => {
                handle_profile_command(&bot, &msg, &user, &state, rest).await?;
                return Ok(());
            }
            _ => {
                // Unknown command, still check for links.
            }
        }
    }

    if let Some(link) = state.links.find(&text) {
        handle_media_link(&bot, &msg, user.id.0, &state, &link).await?;
    }

    Ok(())
}

async fn handle_add_command(
    bot: &Bot,
    msg: &Message,
    user: &teloxide::types::User,
    state: &std::sync::Arc<AppState>,
    anilist_name: &str,
) -> Result<()> {
    let user_id = user.id.0;
    let name = display_name(user);
    if state.users.lock().await.get(user_id).is_some() {
        let reply = format!("You are already linked, {}. Use /remove first.", name);
        send_error(bot, msg.chat.id, &reply).await?;
        return Ok(());
    }

    let account = match fetch_user(state.client.as_ref(), anilist_name).await {
        Ok(account) => account,
        Err(err) if err.is_not_found() => {
            let reply = format!(
                "The username {} couldn't be found on AniList, please check the spelling.",
                anilist_name
            );
            send_error(bot, msg.chat.id, &reply).await?;
            return Ok(());
        }
        Err(err) => {
            warn!("checking AniList user {} failed: {}", anilist_name, err);
            send_error(bot, msg.chat.id, UNAVAILABLE_REPLY).await?;
            return Ok(());
        }
    };

    let added = state
        .users
        .lock()
        .await
        .add(RegisteredUser::new(user_id, &name, &account.name));
    if let Err(err) = added {
        debug!("link for {} rejected: {}", user_id, err);
        let reply = format!("You are already linked, {}.", name);
        send_error(bot, msg.chat.id, &reply).await?;
        return Ok(());
    }
    info!("linked {} to AniList user {}", user_id, account.name);

    if state.scrape_requests.send(user_id).is_err() {
        warn!("poller is gone; {} waits for the next pass", account.name);
    }

    let profile = account
        .site_url
        .unwrap_or_else(|| format!("https://anilist.co/user/{}", account.name));
    let reply = format!(
        "Linked to {}. Your lists could take a few minutes to load.",
        profile
    );
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn handle_remove_command(
    bot: &Bot,
    msg: &Message,
    user: &teloxide::types::User,
    state: &std::sync::Arc<AppState>,
) -> Result<()> {
    let removed = state.users.lock().await.remove(user.id.0);
    match removed {
        Ok(removed) => {
            info!("unlinked {} ({})", removed.id, removed.anilist_name);
            let reply = format!("Unlinked AniList account {}.", removed.anilist_name);
            bot.send_message(msg.chat.id, reply).await?;
        }
        Err(_) => {
            send_error(bot, msg.chat.id, "You don't have a linked AniList account.").await?;
        }
    }
    Ok(())
}

async fn handle_profile_command(
    bot: &Bot,
    msg: &Message,
    user: &teloxide::types::User,
    state: &std::sync::Arc<AppState>,
    name: &str,
) -> Result<()> {
    let profile = {
        let store = state.users.lock().await;
        let target = if !name.is_empty() {
            store.find_by_name(name)
        } else if let Some(replied) = msg.reply_to_message().and_then(|m| m.from()) {
            store.get(replied.id.0)
        } else {
            store.get(user.id.0)
        };
        target.map(build_profile_text)
    };

    match profile {
        Some(text) => {
            bot.send_message(msg.chat.id, text).await?;
        }
        None => {
            send_error(bot, msg.chat.id, "That user hasn't linked an AniList account.").await?;
        }
    }
    Ok(())
}

async fn handle_media_link(
    bot: &Bot,
    msg: &Message,
    owner: u64,
    state: &std::sync::Arc<AppState>,
    link: &lookup::MediaLink,
) -> Result<()> {
    let result = match lookup_link(state.client.as_ref(), &state.users, link).await {
        Ok(result) => result,
        Err(err) if err.is_not_found() => {
            send_error(bot, msg.chat.id, "Couldn't find that title on AniList.").await?;
            return Ok(());
        }
        Err(err) => {
            warn!("lookup of {} failed: {}", link.url, err);
            send_error(bot, msg.chat.id, UNAVAILABLE_REPLY).await?;
            return Ok(());
        }
    };

    let page_size = state.sessions.lock().await.page_size();
    let view = PageView::new(&result.media, &link.url, &result.rows, 0, page_size);
    let (text, kb) = build_card_view(&view);
    let sent = bot
        .send_message(msg.chat.id, text)
        .reply_to_message_id(msg.id)
        .reply_markup(kb)
        .await?;

    let created = state.sessions.lock().await.create(
        SessionId::new(msg.chat.id, sent.id),
        owner,
        result.rows,
        result.media,
        &link.url,
        Instant::now(),
    );
    if let Err(err) = created {
        error!("tracking card failed: {}", err);
    }
    Ok(())
}
