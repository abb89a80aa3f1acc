use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{
    FeedPost, ImageRef, NotificationKind, Post, PublicProfile, User, POST_COLUMNS,
};
use crate::error::{is_unique_violation, AppError, AppResult};
use crate::social::counters::{self, Counter};
use crate::social::notifications;

const MAX_CAPTION_LEN: usize = 2000;

/// Select list for [`feed_post_from_row`]. `?1` is the viewer's user id.
pub(crate) const FEED_SELECT: &str =
    "SELECT p.id, p.user_id, p.image_url, p.storage_id, p.caption, p.likes, p.comments, p.created_at,
            u.id, u.username, u.fullname, u.image,
            EXISTS(SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = ?1),
            EXISTS(SELECT 1 FROM bookmarks b WHERE b.post_id = p.id AND b.user_id = ?1)
     FROM posts p
     JOIN users u ON u.id = p.user_id";

pub(crate) fn feed_post_from_row(row: &Row) -> rusqlite::Result<FeedPost> {
    Ok(FeedPost {
        post: Post::from_row(row, 0)?,
        author: PublicProfile::from_row(row, 8)?,
        is_liked: row.get(12)?,
        is_bookmarked: row.get(13)?,
    })
}

/// Load a post or fail with NotFound.
pub fn post(conn: &Connection, id: &str) -> AppResult<Post> {
    conn.query_row(
        &format!("SELECT {} FROM posts WHERE id = ?1", POST_COLUMNS),
        params![id],
        |row| Post::from_row(row, 0),
    )
    .optional()?
    .ok_or(AppError::NotFound("Post"))
}

/// Publish a post for an already-uploaded image.
pub fn create_post(
    conn: &mut Connection,
    actor: &User,
    storage_id: &str,
    image_url: &str,
    caption: Option<String>,
) -> AppResult<Post> {
    let caption = caption
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    if let Some(ref c) = caption {
        if c.chars().count() > MAX_CAPTION_LEN {
            return Err(AppError::BadRequest(format!(
                "Caption must be {} characters or less",
                MAX_CAPTION_LEN
            )));
        }
    }

    let tx = super::write_tx(conn)?;
    let id = super::new_id();
    tx.execute(
        "INSERT INTO posts (id, user_id, image_url, storage_id, caption, likes, comments, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, ?6)",
        params![id, actor.id, image_url, storage_id, caption, super::now()],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("Image is already used by another post".into())
        } else {
            e.into()
        }
    })?;
    counters::adjust(&tx, Counter::UserPosts, &actor.id, 1)?;
    let created = post(&tx, &id)?;
    tx.commit()?;

    tracing::info!(post_id = %created.id, user_id = %actor.id, "Post created");
    Ok(created)
}

/// Every post, newest first, as seen by `actor`.
pub fn feed(conn: &Connection, actor: &User) -> AppResult<Vec<FeedPost>> {
    let mut stmt = conn.prepare(&format!(
        "{} ORDER BY p.created_at DESC, p.rowid DESC",
        FEED_SELECT
    ))?;
    let posts = stmt
        .query_map(params![actor.id], feed_post_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

pub fn post_by_id(conn: &Connection, actor: &User, id: &str) -> AppResult<FeedPost> {
    conn.query_row(
        &format!("{} WHERE p.id = ?2", FEED_SELECT),
        params![actor.id, id],
        feed_post_from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound("Post"))
}

/// Posts owned by `user_id`, or by the actor when no user is given.
pub fn posts_by_user(
    conn: &Connection,
    actor: &User,
    user_id: Option<&str>,
) -> AppResult<Vec<Post>> {
    let owner = match user_id {
        Some(id) => super::users::user_profile(conn, id)?.id,
        None => actor.id.clone(),
    };

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM posts WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
        POST_COLUMNS
    ))?;
    let posts = stmt
        .query_map(params![owner], |row| Post::from_row(row, 0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

pub fn all_images(conn: &Connection) -> AppResult<Vec<ImageRef>> {
    let mut stmt =
        conn.prepare("SELECT id, image_url FROM posts ORDER BY created_at DESC, rowid DESC")?;
    let images = stmt
        .query_map([], |row| {
            Ok(ImageRef {
                id: row.get(0)?,
                image_url: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(images)
}

/// Like the post if the actor hasn't yet, unlike it otherwise.
/// Returns whether the actor likes it afterwards.
pub fn toggle_like(conn: &mut Connection, actor: &User, post_id: &str) -> AppResult<bool> {
    let tx = super::write_tx(conn)?;
    let target = post(&tx, post_id)?;

    let existing: Option<String> = tx
        .query_row(
            "SELECT id FROM likes WHERE user_id = ?1 AND post_id = ?2",
            params![actor.id, target.id],
            |row| row.get(0),
        )
        .optional()?;

    let now_liked = match existing {
        Some(like_id) => {
            tx.execute("DELETE FROM likes WHERE id = ?1", params![like_id])?;
            counters::adjust(&tx, Counter::PostLikes, &target.id, -1)?;
            false
        }
        None => {
            tx.execute(
                "INSERT INTO likes (id, user_id, post_id, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![super::new_id(), actor.id, target.id, super::now()],
            )?;
            counters::adjust(&tx, Counter::PostLikes, &target.id, 1)?;
            notifications::notify(
                &tx,
                &target.user_id,
                &actor.id,
                NotificationKind::Like,
                Some(&target.id),
                None,
            )?;
            true
        }
    };

    tx.commit()?;
    tracing::debug!(post_id = %target.id, user_id = %actor.id, now_liked, "Like toggled");
    Ok(now_liked)
}

/// Delete one of the actor's posts together with everything that refers to it.
///
/// The whole cascade commits or rolls back as one transaction. The returned
/// post still names its `storage_id`; removing the image itself is left to
/// the caller since the blob store is outside the transaction.
pub fn delete_post(conn: &mut Connection, actor: &User, post_id: &str) -> AppResult<Post> {
    let tx = super::write_tx(conn)?;
    let target = post(&tx, post_id)?;

    if target.user_id != actor.id {
        return Err(AppError::NotAuthorized);
    }

    // Notifications first: comment notifications reference the comments below.
    let notifications = tx.execute(
        "DELETE FROM notifications WHERE post_id = ?1",
        params![target.id],
    )?;
    let likes = tx.execute("DELETE FROM likes WHERE post_id = ?1", params![target.id])?;
    let comments = tx.execute(
        "DELETE FROM comments WHERE post_id = ?1",
        params![target.id],
    )?;
    let bookmarks = tx.execute(
        "DELETE FROM bookmarks WHERE post_id = ?1",
        params![target.id],
    )?;
    tx.execute("DELETE FROM posts WHERE id = ?1", params![target.id])?;
    counters::adjust(&tx, Counter::UserPosts, &target.user_id, -1)?;

    tx.commit()?;
    tracing::info!(
        post_id = %target.id,
        likes,
        comments,
        bookmarks,
        notifications,
        "Post deleted"
    );
    Ok(target)
}
