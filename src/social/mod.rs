//! Social-graph operations: users, posts, likes, comments, follows, bookmarks
//! and the notifications they fan out.
//!
//! Every operation takes the acting [`User`](crate::db::models::User)
//! explicitly. Mutations run in a single immediate transaction so the
//! denormalized counters never diverge from the rows they count.

pub mod bookmarks;
pub mod comments;
pub mod counters;
pub mod notifications;
pub mod posts;
pub mod users;

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::error::AppResult;

/// Creation timestamp. Fixed-width so text ordering matches time ordering.
pub(crate) fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

pub(crate) fn write_tx(conn: &mut Connection) -> AppResult<Transaction<'_>> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

#[cfg(test)]
pub(crate) mod testing {
    use rusqlite::Connection;

    use crate::db::models::{Post, User};
    use crate::social::{posts, users};

    pub fn user(conn: &mut Connection, username: &str) -> User {
        users::create_user(
            conn,
            &format!("sub-{}", username),
            users::NewUser {
                username: username.to_string(),
                fullname: format!("{} Example", username),
                email: format!("{}@example.com", username),
                bio: None,
                image: format!("https://img.example.com/{}.jpg", username),
            },
        )
        .unwrap()
    }

    pub fn post(conn: &mut Connection, owner: &User) -> Post {
        let storage_id = crate::social::new_id();
        let url = format!("https://img.example.com/{}", storage_id);
        posts::create_post(conn, owner, &storage_id, &url, Some("hello".into())).unwrap()
    }

    pub fn reload(conn: &Connection, user: &User) -> User {
        users::user_profile(conn, &user.id).unwrap()
    }

    pub fn count(conn: &Connection, sql: &str, id: &str) -> i64 {
        conn.query_row(sql, [id], |row| row.get(0)).unwrap()
    }
}
