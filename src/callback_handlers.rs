use super::*;

const REACTION_PREFIX: &str = "react:";

pub(super) async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: std::sync::Arc<AppState>,
) -> Result<()> {
    let glyph = q
        .data
        .as_deref()
        .and_then(|data| data.strip_prefix(REACTION_PREFIX))
        .map(|glyph| glyph.to_string());

    match glyph {
        Some(glyph) => handle_reaction_callback(bot, q, state, &glyph).await,
        None => {
            bot.answer_callback_query(q.id).await?;
            Ok(())
        }
    }
}

async fn handle_reaction_callback(
    bot: Bot,
    q: CallbackQuery,
    state: std::sync::Arc<AppState>,
    glyph: &str,
) -> Result<()> {
    let Some(message) = q.message.clone() else {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };

    let session = SessionId::new(message.chat.id, message.id);
    let request = {
        let mut sessions = state.sessions.lock().await;
        route_reaction(&mut sessions, session, q.from.id.0, glyph)
    };

    let render_result = match &request {
        Some(request) => apply_render(&bot, request).await,
        None => Ok(()),
    };
    if let Err(err) = render_result {
        error!("applying reaction on {} failed: {:#}", message.id.0, err);
    }

    // Unrecognised buttons get answered too, otherwise the client keeps spinning.
    let clear = request.as_ref().map_or(true, |r| r.clear_trigger);
    if clear {
        bot.answer_callback_query(q.id).await?;
    }
    Ok(())
}
