use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::{FeedPost, User};
use crate::error::AppResult;
use crate::social::posts::{self, feed_post_from_row, FEED_SELECT};

/// Bookmark the post if the actor hasn't yet, remove the bookmark otherwise.
/// Returns whether the post is bookmarked afterwards.
pub fn toggle_bookmark(conn: &mut Connection, actor: &User, post_id: &str) -> AppResult<bool> {
    let tx = super::write_tx(conn)?;
    let target = posts::post(&tx, post_id)?;

    let existing: Option<String> = tx
        .query_row(
            "SELECT id FROM bookmarks WHERE user_id = ?1 AND post_id = ?2",
            params![actor.id, target.id],
            |row| row.get(0),
        )
        .optional()?;

    let now_bookmarked = match existing {
        Some(bookmark_id) => {
            tx.execute("DELETE FROM bookmarks WHERE id = ?1", params![bookmark_id])?;
            false
        }
        None => {
            tx.execute(
                "INSERT INTO bookmarks (id, user_id, post_id, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![super::new_id(), actor.id, target.id, super::now()],
            )?;
            true
        }
    };

    tx.commit()?;
    Ok(now_bookmarked)
}

/// The actor's bookmarked posts, most recently bookmarked first.
pub fn bookmarked_posts(conn: &Connection, actor: &User) -> AppResult<Vec<FeedPost>> {
    let mut stmt = conn.prepare(&format!(
        "{} JOIN bookmarks bm ON bm.post_id = p.id AND bm.user_id = ?1
         ORDER BY bm.created_at DESC, bm.rowid DESC",
        FEED_SELECT
    ))?;
    let saved = stmt
        .query_map(params![actor.id], feed_post_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(saved)
}
