use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::{NotificationKind, PublicProfile, User, USER_COLUMNS};
use crate::error::{is_unique_violation, AppError, AppResult};
use crate::social::counters::{self, Counter};
use crate::social::notifications;

const MAX_USERNAME_LEN: usize = 30;
const MAX_BIO_LEN: usize = 500;

/// Profile data supplied when an identity signs up.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub fullname: String,
    pub email: String,
    pub bio: Option<String>,
    pub image: String,
}

/// Fields a user may change on their own profile. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub username: Option<String>,
    pub fullname: Option<String>,
    pub bio: Option<String>,
}

fn clean_username(raw: &str) -> AppResult<String> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(AppError::BadRequest("Username cannot be empty".into()));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::BadRequest(format!(
            "Username must be {} characters or less",
            MAX_USERNAME_LEN
        )));
    }
    if username.chars().any(char::is_whitespace) {
        return Err(AppError::BadRequest(
            "Username cannot contain whitespace".into(),
        ));
    }
    Ok(username.to_string())
}

fn clean_bio(raw: Option<String>) -> AppResult<Option<String>> {
    match raw {
        Some(bio) if bio.chars().count() > MAX_BIO_LEN => Err(AppError::BadRequest(format!(
            "Bio must be {} characters or less",
            MAX_BIO_LEN
        ))),
        other => Ok(other),
    }
}

fn username_conflict(err: rusqlite::Error, username: &str) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict(format!("Username '{}' is already taken", username))
    } else {
        err.into()
    }
}

fn find_one(conn: &Connection, column: &str, value: &str) -> AppResult<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column),
            params![value],
            |row| User::from_row(row, 0),
        )
        .optional()?;
    Ok(user)
}

/// Bind a new user to an identity subject. Calling again for the same
/// subject returns the existing user untouched.
pub fn create_user(conn: &mut Connection, subject: &str, new: NewUser) -> AppResult<User> {
    let tx = super::write_tx(conn)?;

    if let Some(existing) = find_one(&tx, "subject", subject)? {
        return Ok(existing);
    }

    let username = clean_username(&new.username)?;
    let bio = clean_bio(new.bio)?;
    let id = super::new_id();

    tx.execute(
        "INSERT INTO users (id, subject, username, fullname, email, bio, image, followers, following, posts, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, 0, 0, ?8)",
        params![
            id,
            subject,
            username,
            new.fullname.trim(),
            new.email.trim(),
            bio,
            new.image,
            super::now()
        ],
    )
    .map_err(|e| username_conflict(e, &username))?;

    let user = find_one(&tx, "id", &id)?.ok_or(AppError::NotFound("User"))?;
    tx.commit()?;

    tracing::info!(user_id = %user.id, username = %user.username, "User created");
    Ok(user)
}

pub fn find_by_subject(conn: &Connection, subject: &str) -> AppResult<Option<User>> {
    find_one(conn, "subject", subject)
}

pub fn user_by_subject(conn: &Connection, subject: &str) -> AppResult<User> {
    find_by_subject(conn, subject)?.ok_or(AppError::NotFound("User"))
}

pub fn user_profile(conn: &Connection, id: &str) -> AppResult<User> {
    find_one(conn, "id", id)?.ok_or(AppError::NotFound("User"))
}

pub fn user_by_username(conn: &Connection, username: &str) -> AppResult<User> {
    find_one(conn, "username", username.trim())?.ok_or(AppError::NotFound("User"))
}

pub fn update_user(conn: &mut Connection, actor: &User, patch: ProfilePatch) -> AppResult<User> {
    let tx = super::write_tx(conn)?;
    let current = find_one(&tx, "id", &actor.id)?.ok_or(AppError::NotFound("User"))?;

    let username = match patch.username {
        Some(ref raw) => clean_username(raw)?,
        None => current.username,
    };
    let fullname = patch
        .fullname
        .map(|f| f.trim().to_string())
        .unwrap_or(current.fullname);
    let bio = match patch.bio {
        Some(bio) => clean_bio(Some(bio))?,
        None => current.bio,
    };

    tx.execute(
        "UPDATE users SET username = ?1, fullname = ?2, bio = ?3 WHERE id = ?4",
        params![username, fullname, bio, actor.id],
    )
    .map_err(|e| username_conflict(e, &username))?;

    let user = find_one(&tx, "id", &actor.id)?.ok_or(AppError::NotFound("User"))?;
    tx.commit()?;
    Ok(user)
}

/// Point the actor's avatar at a new image. An unresolved image keeps the old one.
pub fn update_user_image(
    conn: &mut Connection,
    actor: &User,
    image_url: Option<&str>,
) -> AppResult<User> {
    let tx = super::write_tx(conn)?;
    if let Some(url) = image_url {
        tx.execute(
            "UPDATE users SET image = ?1 WHERE id = ?2",
            params![url, actor.id],
        )?;
    }
    let user = find_one(&tx, "id", &actor.id)?.ok_or(AppError::NotFound("User"))?;
    tx.commit()?;
    Ok(user)
}

/// Whether any user's avatar points at `image_url`.
pub fn image_in_use(conn: &Connection, image_url: &str) -> AppResult<bool> {
    let used = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE image = ?1)",
        params![image_url],
        |row| row.get(0),
    )?;
    Ok(used)
}

pub fn is_following(conn: &Connection, actor: &User, following_id: &str) -> AppResult<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = ?1 AND following_id = ?2)",
        params![actor.id, following_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Follow `following_id` if the actor doesn't yet, unfollow otherwise.
/// Returns whether the actor follows them afterwards.
pub fn toggle_follow(conn: &mut Connection, actor: &User, following_id: &str) -> AppResult<bool> {
    if actor.id == following_id {
        return Err(AppError::BadRequest("You cannot follow yourself".into()));
    }

    let tx = super::write_tx(conn)?;
    let target = find_one(&tx, "id", following_id)?.ok_or(AppError::NotFound("User"))?;

    let existing: Option<String> = tx
        .query_row(
            "SELECT id FROM follows WHERE follower_id = ?1 AND following_id = ?2",
            params![actor.id, target.id],
            |row| row.get(0),
        )
        .optional()?;

    let now_following = match existing {
        Some(follow_id) => {
            tx.execute("DELETE FROM follows WHERE id = ?1", params![follow_id])?;
            counters::adjust(&tx, Counter::UserFollowing, &actor.id, -1)?;
            counters::adjust(&tx, Counter::UserFollowers, &target.id, -1)?;
            false
        }
        None => {
            tx.execute(
                "INSERT INTO follows (id, follower_id, following_id, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![super::new_id(), actor.id, target.id, super::now()],
            )?;
            counters::adjust(&tx, Counter::UserFollowing, &actor.id, 1)?;
            counters::adjust(&tx, Counter::UserFollowers, &target.id, 1)?;
            notifications::notify(
                &tx,
                &target.id,
                &actor.id,
                NotificationKind::Follow,
                None,
                None,
            )?;
            true
        }
    };

    tx.commit()?;
    tracing::debug!(follower = %actor.id, following = %target.id, now_following, "Follow toggled");
    Ok(now_following)
}

fn profiles(conn: &Connection, sql: &str, user_id: &str) -> AppResult<Vec<PublicProfile>> {
    let mut stmt = conn.prepare(sql)?;
    let list = stmt
        .query_map(params![user_id], |row| PublicProfile::from_row(row, 0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(list)
}

/// Users following `user_id`, most recent first.
pub fn followers(conn: &Connection, user_id: &str) -> AppResult<Vec<PublicProfile>> {
    user_profile(conn, user_id)?;
    profiles(
        conn,
        "SELECT u.id, u.username, u.fullname, u.image
         FROM follows f JOIN users u ON u.id = f.follower_id
         WHERE f.following_id = ?1
         ORDER BY f.created_at DESC, f.rowid DESC",
        user_id,
    )
}

/// Users `user_id` follows, most recent first.
pub fn following(conn: &Connection, user_id: &str) -> AppResult<Vec<PublicProfile>> {
    user_profile(conn, user_id)?;
    profiles(
        conn,
        "SELECT u.id, u.username, u.fullname, u.image
         FROM follows f JOIN users u ON u.id = f.following_id
         WHERE f.follower_id = ?1
         ORDER BY f.created_at DESC, f.rowid DESC",
        user_id,
    )
}
