use async_graphql::{Enum, SimpleObject};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// Column list matching [`User::from_row`].
pub const USER_COLUMNS: &str =
    "id, subject, username, fullname, email, bio, image, followers, following, posts, created_at";

/// Column list matching [`Post::from_row`].
pub const POST_COLUMNS: &str =
    "id, user_id, image_url, storage_id, caption, likes, comments, created_at";

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
pub struct User {
    pub id: String,
    /// Identity provider subject this account is bound to
    pub subject: String,
    pub username: String,
    pub fullname: String,
    pub email: String,
    pub bio: Option<String>,
    pub image: String,
    pub followers: i64,
    pub following: i64,
    pub posts: i64,
    pub created_at: String,
}

impl User {
    pub fn from_row(row: &Row, start: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(start)?,
            subject: row.get(start + 1)?,
            username: row.get(start + 2)?,
            fullname: row.get(start + 3)?,
            email: row.get(start + 4)?,
            bio: row.get(start + 5)?,
            image: row.get(start + 6)?,
            followers: row.get(start + 7)?,
            following: row.get(start + 8)?,
            posts: row.get(start + 9)?,
            created_at: row.get(start + 10)?,
        })
    }

    pub fn profile(&self) -> PublicProfile {
        PublicProfile {
            id: self.id.clone(),
            username: self.username.clone(),
            fullname: self.fullname.clone(),
            image: self.image.clone(),
        }
    }
}

/// The fields of a user shown next to their posts, comments and notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
pub struct PublicProfile {
    pub id: String,
    pub username: String,
    pub fullname: String,
    pub image: String,
}

impl PublicProfile {
    pub fn from_row(row: &Row, start: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(start)?,
            username: row.get(start + 1)?,
            fullname: row.get(start + 2)?,
            image: row.get(start + 3)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub image_url: String,
    pub storage_id: String,
    pub caption: Option<String>,
    pub likes: i64,
    pub comments: i64,
    pub created_at: String,
}

impl Post {
    pub fn from_row(row: &Row, start: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(start)?,
            user_id: row.get(start + 1)?,
            image_url: row.get(start + 2)?,
            storage_id: row.get(start + 3)?,
            caption: row.get(start + 4)?,
            likes: row.get(start + 5)?,
            comments: row.get(start + 6)?,
            created_at: row.get(start + 7)?,
        })
    }
}

/// A post as seen by a particular viewer.
#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
pub struct FeedPost {
    pub post: Post,
    pub author: PublicProfile,
    pub is_liked: bool,
    pub is_bookmarked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
pub struct ImageRef {
    pub id: String,
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
pub struct CommentWithAuthor {
    pub id: String,
    pub post_id: String,
    pub content: String,
    pub created_at: String,
    pub author: PublicProfile,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Enum)]
pub enum NotificationKind {
    Like,
    Comment,
    Follow,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Like => "like",
            NotificationKind::Comment => "comment",
            NotificationKind::Follow => "follow",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "like" => Some(NotificationKind::Like),
            "comment" => Some(NotificationKind::Comment),
            "follow" => Some(NotificationKind::Follow),
            _ => None,
        }
    }
}

impl ToSql for NotificationKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for NotificationKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        NotificationKind::parse(s)
            .ok_or_else(|| FromSqlError::Other(format!("unknown notification kind: {}", s).into()))
    }
}

/// A notification resolved for display to its receiver.
#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
pub struct NotificationView {
    pub id: String,
    pub kind: NotificationKind,
    pub created_at: String,
    pub sender: PublicProfile,
    pub post: Option<Post>,
    /// Text of the comment, for comment notifications
    pub comment: Option<String>,
}
