use rusqlite::{params, Connection};

use crate::db::models::{CommentWithAuthor, NotificationKind, PublicProfile, User};
use crate::error::{AppError, AppResult};
use crate::social::counters::{self, Counter};
use crate::social::{notifications, posts};

const MAX_COMMENT_LEN: usize = 500;

/// Comment on a post and notify its owner. Returns the new comment's id.
pub fn add_comment(
    conn: &mut Connection,
    actor: &User,
    post_id: &str,
    content: &str,
) -> AppResult<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::BadRequest("Comment cannot be empty".into()));
    }
    if content.chars().count() > MAX_COMMENT_LEN {
        return Err(AppError::BadRequest(format!(
            "Comment must be {} characters or less",
            MAX_COMMENT_LEN
        )));
    }

    let tx = super::write_tx(conn)?;
    let target = posts::post(&tx, post_id)?;

    let comment_id = super::new_id();
    tx.execute(
        "INSERT INTO comments (id, user_id, post_id, content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![comment_id, actor.id, target.id, content, super::now()],
    )?;
    counters::adjust(&tx, Counter::PostComments, &target.id, 1)?;
    notifications::notify(
        &tx,
        &target.user_id,
        &actor.id,
        NotificationKind::Comment,
        Some(&target.id),
        Some(&comment_id),
    )?;

    tx.commit()?;
    tracing::debug!(post_id = %target.id, user_id = %actor.id, "Comment added");
    Ok(comment_id)
}

/// Comments on a post, oldest first. A missing post simply has none.
pub fn comments_for_post(conn: &Connection, post_id: &str) -> AppResult<Vec<CommentWithAuthor>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.post_id, c.content, c.created_at,
                u.id, u.username, u.fullname, u.image
         FROM comments c
         JOIN users u ON u.id = c.user_id
         WHERE c.post_id = ?1
         ORDER BY c.created_at ASC, c.rowid ASC",
    )?;

    let comments = stmt
        .query_map(params![post_id], |row| {
            Ok(CommentWithAuthor {
                id: row.get(0)?,
                post_id: row.get(1)?,
                content: row.get(2)?,
                created_at: row.get(3)?,
                author: PublicProfile::from_row(row, 4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(comments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;
    use crate::social::testing;

    const COMMENT_NOTIFICATIONS: &str =
        "SELECT COUNT(*) FROM notifications WHERE receiver_id = ?1 AND kind = 'comment'";

    #[test]
    fn add_comment_bumps_count_and_notifies_owner() {
        let mut conn = test_connection();
        let alice = testing::user(&mut conn, "alice");
        let bob = testing::user(&mut conn, "bob");
        let p = testing::post(&mut conn, &alice);

        let id = add_comment(&mut conn, &bob, &p.id, "  great light  ").unwrap();
        assert_eq!(posts::post(&conn, &p.id).unwrap().comments, 1);
        assert_eq!(testing::count(&conn, COMMENT_NOTIFICATIONS, &alice.id), 1);

        let listed = comments_for_post(&conn, &p.id).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
        assert_eq!(listed[0].content, "great light");
        assert_eq!(listed[0].author, bob.profile());
    }

    #[test]
    fn self_comment_creates_no_notification() {
        let mut conn = test_connection();
        let alice = testing::user(&mut conn, "alice");
        let p = testing::post(&mut conn, &alice);

        add_comment(&mut conn, &alice, &p.id, "my own").unwrap();
        assert_eq!(posts::post(&conn, &p.id).unwrap().comments, 1);
        assert_eq!(testing::count(&conn, COMMENT_NOTIFICATIONS, &alice.id), 0);
    }

    #[test]
    fn comments_are_listed_oldest_first() {
        let mut conn = test_connection();
        let alice = testing::user(&mut conn, "alice");
        let bob = testing::user(&mut conn, "bob");
        let p = testing::post(&mut conn, &alice);

        add_comment(&mut conn, &bob, &p.id, "first").unwrap();
        add_comment(&mut conn, &alice, &p.id, "second").unwrap();

        let contents: Vec<_> = comments_for_post(&conn, &p.id)
            .unwrap()
            .into_iter()
            .map(|c| c.content)
            .collect();
        assert_eq!(contents, vec!["first", "second"]);
    }

    #[test]
    fn rejects_empty_and_overlong_comments() {
        let mut conn = test_connection();
        let alice = testing::user(&mut conn, "alice");
        let p = testing::post(&mut conn, &alice);

        assert!(matches!(
            add_comment(&mut conn, &alice, &p.id, "   ").unwrap_err(),
            AppError::BadRequest(_)
        ));
        assert!(matches!(
            add_comment(&mut conn, &alice, &p.id, &"x".repeat(501)).unwrap_err(),
            AppError::BadRequest(_)
        ));
        assert_eq!(posts::post(&conn, &p.id).unwrap().comments, 0);
    }

    #[test]
    fn comment_on_missing_post_is_not_found() {
        let mut conn = test_connection();
        let alice = testing::user(&mut conn, "alice");
        assert!(matches!(
            add_comment(&mut conn, &alice, "ghost", "hello").unwrap_err(),
            AppError::NotFound("Post")
        ));
        assert!(comments_for_post(&conn, "ghost").unwrap().is_empty());
    }
}
