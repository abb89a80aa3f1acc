use async_graphql::*;

use super::{actor, connection};
use crate::db::models::{
    CommentWithAuthor, FeedPost, ImageRef, NotificationView, Post, PublicProfile, User,
};
use crate::social::{bookmarks, comments, notifications, posts, users};

/// GraphQL Query root
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// The signed-in user
    async fn me(&self, ctx: &Context<'_>) -> Result<User> {
        let conn = connection(ctx).extend()?;
        actor(ctx, &conn).extend()
    }

    /// Look up a user by identity provider subject
    async fn user_by_subject(&self, ctx: &Context<'_>, subject: String) -> Result<User> {
        let conn = connection(ctx).extend()?;
        users::user_by_subject(&conn, &subject).extend()
    }

    /// A user's full profile
    async fn user_profile(&self, ctx: &Context<'_>, id: ID) -> Result<User> {
        let conn = connection(ctx).extend()?;
        users::user_profile(&conn, &id).extend()
    }

    async fn user_by_username(&self, ctx: &Context<'_>, username: String) -> Result<User> {
        let conn = connection(ctx).extend()?;
        actor(ctx, &conn).extend()?;
        users::user_by_username(&conn, &username).extend()
    }

    /// Whether the signed-in user follows `followingId`
    async fn is_following(&self, ctx: &Context<'_>, following_id: ID) -> Result<bool> {
        let conn = connection(ctx).extend()?;
        let me = actor(ctx, &conn).extend()?;
        users::is_following(&conn, &me, &following_id).extend()
    }

    async fn followers(&self, ctx: &Context<'_>, user_id: ID) -> Result<Vec<PublicProfile>> {
        let conn = connection(ctx).extend()?;
        users::followers(&conn, &user_id).extend()
    }

    async fn following(&self, ctx: &Context<'_>, user_id: ID) -> Result<Vec<PublicProfile>> {
        let conn = connection(ctx).extend()?;
        users::following(&conn, &user_id).extend()
    }

    /// Every post, newest first
    async fn feed(&self, ctx: &Context<'_>) -> Result<Vec<FeedPost>> {
        let conn = connection(ctx).extend()?;
        let me = actor(ctx, &conn).extend()?;
        posts::feed(&conn, &me).extend()
    }

    async fn post(&self, ctx: &Context<'_>, id: ID) -> Result<FeedPost> {
        let conn = connection(ctx).extend()?;
        let me = actor(ctx, &conn).extend()?;
        posts::post_by_id(&conn, &me, &id).extend()
    }

    /// Posts by `userId`, or by the signed-in user when omitted
    async fn posts_by_user(&self, ctx: &Context<'_>, user_id: Option<ID>) -> Result<Vec<Post>> {
        let conn = connection(ctx).extend()?;
        let me = actor(ctx, &conn).extend()?;
        posts::posts_by_user(&conn, &me, user_id.as_deref().map(String::as_str)).extend()
    }

    async fn all_images(&self, ctx: &Context<'_>) -> Result<Vec<ImageRef>> {
        let conn = connection(ctx).extend()?;
        posts::all_images(&conn).extend()
    }

    /// Comments on a post, oldest first
    async fn comments(&self, ctx: &Context<'_>, post_id: ID) -> Result<Vec<CommentWithAuthor>> {
        let conn = connection(ctx).extend()?;
        comments::comments_for_post(&conn, &post_id).extend()
    }

    /// The signed-in user's notifications, newest first
    async fn notifications(&self, ctx: &Context<'_>) -> Result<Vec<NotificationView>> {
        let conn = connection(ctx).extend()?;
        let me = actor(ctx, &conn).extend()?;
        notifications::list_for_receiver(&conn, &me).extend()
    }

    async fn bookmarked_posts(&self, ctx: &Context<'_>) -> Result<Vec<FeedPost>> {
        let conn = connection(ctx).extend()?;
        let me = actor(ctx, &conn).extend()?;
        bookmarks::bookmarked_posts(&conn, &me).extend()
    }
}
