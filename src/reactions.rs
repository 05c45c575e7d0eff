use super::*;

pub(crate) const PREV_GLYPH: &str = "⬅️";
pub(crate) const NEXT_GLYPH: &str = "➡️";
pub(crate) const DISMISS_GLYPH: &str = "❌";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReactionAction {
    Prev,
    Next,
    Dismiss,
}

impl ReactionAction {
    pub(crate) fn from_glyph(glyph: &str) -> Option<Self> {
        match glyph.trim().trim_end_matches('\u{fe0f}') {
            "⬅" | "◀" => Some(ReactionAction::Prev),
            "➡" | "▶" => Some(ReactionAction::Next),
            "❌" | "✖" => Some(ReactionAction::Dismiss),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RenderUpdate {
    Page(PageView),
    /// Put the message back to the bare link and drop the controls.
    Revert { media_link: String },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RenderRequest {
    pub(crate) session: SessionId,
    pub(crate) update: Option<RenderUpdate>,
    pub(crate) clear_trigger: bool,
}

/// Applies one reaction to the tracker. `None` means the glyph is not one of ours.
///
/// Any recognised reaction asks for the trigger to be cleared, whether or not the
/// session changed. Wrong actors and unknown sessions produce no update.
pub(crate) fn route_reaction(
    tracker: &mut SessionTracker,
    session: SessionId,
    actor: u64,
    glyph: &str,
) -> Option<RenderRequest> {
    let action = ReactionAction::from_glyph(glyph)?;
    let update = match action {
        ReactionAction::Prev | ReactionAction::Next => {
            let delta = if action == ReactionAction::Prev { -1 } else { 1 };
            match tracker.navigate(session, actor, delta) {
                Ok(Navigation::Moved(_)) => tracker.view(session).map(RenderUpdate::Page),
                Ok(Navigation::AtBoundary) | Ok(Navigation::NotOwner) => None,
                Err(err) => {
                    debug!("reaction on message {} ignored: {}", session.message_id, err);
                    None
                }
            }
        }
        ReactionAction::Dismiss => match tracker.dismiss_by(session, actor) {
            Ok(removed) => Some(RenderUpdate::Revert {
                media_link: removed.media_link,
            }),
            Err(err) => {
                debug!("dismiss on message {} ignored: {}", session.message_id, err);
                None
            }
        },
    };

    Some(RenderRequest {
        session,
        update,
        clear_trigger: true,
    })
}

/// Drops every session past its TTL and asks for each card to be reverted.
pub(crate) fn sweep_expired(tracker: &mut SessionTracker, now: Instant) -> Vec<RenderRequest> {
    tracker
        .expired(now)
        .into_iter()
        .filter_map(|id| tracker.expire(id))
        .map(|session| RenderRequest {
            session: session.id,
            update: Some(RenderUpdate::Revert {
                media_link: session.media_link,
            }),
            clear_trigger: false,
        })
        .collect()
}
