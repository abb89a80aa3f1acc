use rusqlite::{params, Connection};

use crate::db::models::{NotificationKind, NotificationView, Post, PublicProfile, User};
use crate::error::AppResult;

/// Record a notification for `receiver_id` about something `sender_id` did.
///
/// Nothing is written when the two are the same user; returns the new id otherwise.
pub fn notify(
    conn: &Connection,
    receiver_id: &str,
    sender_id: &str,
    kind: NotificationKind,
    post_id: Option<&str>,
    comment_id: Option<&str>,
) -> AppResult<Option<String>> {
    if receiver_id == sender_id {
        return Ok(None);
    }

    let id = super::new_id();
    conn.execute(
        "INSERT INTO notifications (id, receiver_id, sender_id, kind, post_id, comment_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![id, receiver_id, sender_id, kind, post_id, comment_id, super::now()],
    )?;

    tracing::debug!(receiver_id, sender_id, kind = kind.as_str(), "Notification created");
    Ok(Some(id))
}

/// All notifications addressed to `actor`, newest first.
pub fn list_for_receiver(conn: &Connection, actor: &User) -> AppResult<Vec<NotificationView>> {
    let mut stmt = conn.prepare(
        "SELECT n.id, n.kind, n.created_at,
                s.id, s.username, s.fullname, s.image,
                p.id, p.user_id, p.image_url, p.storage_id, p.caption, p.likes, p.comments, p.created_at,
                c.content
         FROM notifications n
         JOIN users s ON s.id = n.sender_id
         LEFT JOIN posts p ON p.id = n.post_id
         LEFT JOIN comments c ON c.id = n.comment_id AND n.kind = 'comment'
         WHERE n.receiver_id = ?1
         ORDER BY n.created_at DESC, n.rowid DESC",
    )?;

    let notifications = stmt
        .query_map(params![actor.id], |row| {
            let post = match row.get::<_, Option<String>>(7)? {
                Some(_) => Some(Post::from_row(row, 7)?),
                None => None,
            };
            Ok(NotificationView {
                id: row.get(0)?,
                kind: row.get(1)?,
                created_at: row.get(2)?,
                sender: PublicProfile::from_row(row, 3)?,
                post,
                comment: row.get(15)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(notifications)
}
