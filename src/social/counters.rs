use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{AppError, AppResult};

/// A denormalized count stored on a user or post row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    PostLikes,
    PostComments,
    UserFollowers,
    UserFollowing,
    UserPosts,
}

impl Counter {
    pub const ALL: [Counter; 5] = [
        Counter::PostLikes,
        Counter::PostComments,
        Counter::UserFollowers,
        Counter::UserFollowing,
        Counter::UserPosts,
    ];

    fn table(self) -> &'static str {
        match self {
            Counter::PostLikes | Counter::PostComments => "posts",
            Counter::UserFollowers | Counter::UserFollowing | Counter::UserPosts => "users",
        }
    }

    fn column(self) -> &'static str {
        match self {
            Counter::PostLikes => "likes",
            Counter::PostComments => "comments",
            Counter::UserFollowers => "followers",
            Counter::UserFollowing => "following",
            Counter::UserPosts => "posts",
        }
    }

    fn entity(self) -> &'static str {
        match self.table() {
            "posts" => "Post",
            _ => "User",
        }
    }

    /// Subquery computing the true cardinality for row `t`.
    fn cardinality(self) -> &'static str {
        match self {
            Counter::PostLikes => "SELECT COUNT(*) FROM likes x WHERE x.post_id = t.id",
            Counter::PostComments => "SELECT COUNT(*) FROM comments x WHERE x.post_id = t.id",
            Counter::UserFollowers => "SELECT COUNT(*) FROM follows x WHERE x.following_id = t.id",
            Counter::UserFollowing => "SELECT COUNT(*) FROM follows x WHERE x.follower_id = t.id",
            Counter::UserPosts => "SELECT COUNT(*) FROM posts x WHERE x.user_id = t.id",
        }
    }
}

/// Add `delta` to a counter, flooring at zero. Returns the new value.
///
/// Hitting the floor means the counter had already drifted from the rows it
/// counts; it is logged rather than surfaced.
pub fn adjust(conn: &Connection, counter: Counter, id: &str, delta: i64) -> AppResult<i64> {
    let current: i64 = conn
        .query_row(
            &format!(
                "SELECT {} FROM {} WHERE id = ?1",
                counter.column(),
                counter.table()
            ),
            params![id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(AppError::NotFound(counter.entity()))?;

    let mut next = current + delta;
    if next < 0 {
        tracing::warn!(
            ?counter,
            id,
            current,
            delta,
            "Counter would go negative, clamping to zero"
        );
        next = 0;
    }

    conn.execute(
        &format!(
            "UPDATE {} SET {} = ?1 WHERE id = ?2",
            counter.table(),
            counter.column()
        ),
        params![next, id],
    )?;

    Ok(next)
}

/// A stored counter that disagrees with the rows it summarizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterDrift {
    pub counter: Counter,
    pub id: String,
    pub stored: i64,
    pub actual: i64,
}

/// Recompute every counter from the relation tables and report mismatches.
pub fn audit(conn: &Connection) -> AppResult<Vec<CounterDrift>> {
    let mut drift = Vec::new();

    for counter in Counter::ALL {
        let sql = format!(
            "SELECT t.id, t.{col}, ({card}) FROM {table} t WHERE t.{col} <> ({card})",
            col = counter.column(),
            card = counter.cardinality(),
            table = counter.table(),
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(CounterDrift {
                    counter,
                    id: row.get(0)?,
                    stored: row.get(1)?,
                    actual: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        drift.extend(rows);
    }

    Ok(drift)
}

/// Overwrite every drifted counter with its recomputed value.
pub fn reconcile(conn: &mut Connection) -> AppResult<usize> {
    let tx = super::write_tx(conn)?;
    let drift = audit(&tx)?;

    for d in &drift {
        tx.execute(
            &format!(
                "UPDATE {} SET {} = ?1 WHERE id = ?2",
                d.counter.table(),
                d.counter.column()
            ),
            params![d.actual, d.id],
        )?;
    }

    tx.commit()?;
    let fixed = drift.len();
    if fixed > 0 {
        tracing::info!(fixed, "Reconciled drifted counters");
    }
    Ok(fixed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;
    use crate::social::testing;

    #[test]
    fn adjust_moves_by_delta() {
        let mut conn = test_connection();
        let alice = testing::user(&mut conn, "alice");

        assert_eq!(adjust(&conn, Counter::UserFollowers, &alice.id, 1).unwrap(), 1);
        assert_eq!(adjust(&conn, Counter::UserFollowers, &alice.id, 1).unwrap(), 2);
        assert_eq!(adjust(&conn, Counter::UserFollowers, &alice.id, -1).unwrap(), 1);
        assert_eq!(testing::reload(&conn, &alice).followers, 1);
    }

    #[test]
    fn adjust_floors_at_zero() {
        let mut conn = test_connection();
        let alice = testing::user(&mut conn, "alice");

        assert_eq!(adjust(&conn, Counter::UserFollowing, &alice.id, -1).unwrap(), 0);
        assert_eq!(testing::reload(&conn, &alice).following, 0);
    }

    #[test]
    fn adjust_missing_row_is_not_found() {
        let conn = test_connection();
        let err = adjust(&conn, Counter::PostLikes, "missing", 1).unwrap_err();
        assert!(matches!(err, AppError::NotFound("Post")));
    }

    #[test]
    fn audit_is_clean_after_normal_operations() {
        let mut conn = test_connection();
        let alice = testing::user(&mut conn, "alice");
        let bob = testing::user(&mut conn, "bob");
        let post = testing::post(&mut conn, &alice);
        crate::social::posts::toggle_like(&mut conn, &bob, &post.id).unwrap();
        crate::social::users::toggle_follow(&mut conn, &bob, &alice.id).unwrap();

        assert!(audit(&conn).unwrap().is_empty());
    }

    #[test]
    fn audit_reports_and_reconcile_repairs_drift() {
        let mut conn = test_connection();
        let alice = testing::user(&mut conn, "alice");
        let post = testing::post(&mut conn, &alice);
        conn.execute("UPDATE posts SET likes = 7 WHERE id = ?1", [&post.id])
            .unwrap();
        conn.execute("UPDATE users SET posts = 0 WHERE id = ?1", [&alice.id])
            .unwrap();

        let drift = audit(&conn).unwrap();
        assert_eq!(drift.len(), 2);
        assert!(drift.contains(&CounterDrift {
            counter: Counter::PostLikes,
            id: post.id.clone(),
            stored: 7,
            actual: 0,
        }));
        assert!(drift.contains(&CounterDrift {
            counter: Counter::UserPosts,
            id: alice.id.clone(),
            stored: 0,
            actual: 1,
        }));

        assert_eq!(reconcile(&mut conn).unwrap(), 2);
        assert!(audit(&conn).unwrap().is_empty());
        assert_eq!(testing::reload(&conn, &alice).posts, 1);
    }
}
