use async_graphql::*;

use super::{actor, actor_released, blobs, connection, owned_image_url};
use crate::auth::Subject;
use crate::blobs::{tickets, UploadPolicy};
use crate::db::models::{Post, User};
use crate::error::AppError;
use crate::graphql::types::{CreatePostInput, CreateUserInput, UpdateUserInput};
use crate::social::{bookmarks, comments, posts, users};

/// GraphQL Mutation root
pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Create the user record for the signed-in identity. Repeat calls return the existing user.
    async fn create_user(&self, ctx: &Context<'_>, input: CreateUserInput) -> Result<User> {
        let subject = ctx
            .data_opt::<Subject>()
            .ok_or(AppError::NotAuthenticated)
            .extend()?;
        let mut conn = connection(ctx).extend()?;
        users::create_user(&mut conn, subject.as_str(), input.into()).extend()
    }

    async fn update_user(&self, ctx: &Context<'_>, input: UpdateUserInput) -> Result<User> {
        let mut conn = connection(ctx).extend()?;
        let me = actor(ctx, &conn).extend()?;
        users::update_user(&mut conn, &me, input.into()).extend()
    }

    /// Use one of the signed-in user's uploaded images as their avatar
    async fn update_user_image(&self, ctx: &Context<'_>, storage_id: ID) -> Result<User> {
        let me = actor_released(ctx).extend()?;
        let url = owned_image_url(ctx, &me, &storage_id).await.extend()?;
        let mut conn = connection(ctx).extend()?;
        users::update_user_image(&mut conn, &me, url.as_deref()).extend()
    }

    /// Follow or unfollow a user. Returns whether the signed-in user now follows them.
    async fn toggle_follow(&self, ctx: &Context<'_>, following_id: ID) -> Result<bool> {
        let mut conn = connection(ctx).extend()?;
        let me = actor(ctx, &conn).extend()?;
        users::toggle_follow(&mut conn, &me, &following_id).extend()
    }

    /// Issue a single-use URL to POST image bytes to
    async fn generate_upload_url(&self, ctx: &Context<'_>) -> Result<String> {
        let conn = connection(ctx).extend()?;
        let me = actor(ctx, &conn).extend()?;
        let policy = ctx.data::<UploadPolicy>()?;
        let token = tickets::issue_ticket(&conn, &me.id, policy).extend()?;
        Ok(policy.upload_url(&token))
    }

    /// Publish a post for an image the signed-in user uploaded
    async fn create_post(&self, ctx: &Context<'_>, input: CreatePostInput) -> Result<Post> {
        let me = actor_released(ctx).extend()?;
        let image_url = owned_image_url(ctx, &me, &input.storage_id)
            .await
            .extend()?
            .ok_or(AppError::NotFound("Image"))
            .extend()?;
        let mut conn = connection(ctx).extend()?;
        posts::create_post(&mut conn, &me, &input.storage_id, &image_url, input.caption).extend()
    }

    /// Like or unlike a post. Returns whether the signed-in user now likes it.
    async fn toggle_like(&self, ctx: &Context<'_>, post_id: ID) -> Result<bool> {
        let mut conn = connection(ctx).extend()?;
        let me = actor(ctx, &conn).extend()?;
        posts::toggle_like(&mut conn, &me, &post_id).extend()
    }

    /// Delete one of the signed-in user's posts and everything attached to it
    async fn delete_post(&self, ctx: &Context<'_>, post_id: ID) -> Result<bool> {
        let mut conn = connection(ctx).extend()?;
        let me = actor(ctx, &conn).extend()?;
        let deleted = posts::delete_post(&mut conn, &me, &post_id).extend()?;
        let avatar = users::image_in_use(&conn, &deleted.image_url).extend()?;
        drop(conn);

        if avatar {
            tracing::debug!(storage_id = %deleted.storage_id, "Post image kept as avatar");
            return Ok(true);
        }

        // The cascade is committed; a failed image removal is only logged.
        if let Err(e) = blobs(ctx).extend()?.delete(&deleted.storage_id).await {
            tracing::warn!(storage_id = %deleted.storage_id, error = %e, "Failed to delete post image");
        }
        Ok(true)
    }

    /// Comment on a post. Returns the new comment's id.
    async fn add_comment(&self, ctx: &Context<'_>, post_id: ID, content: String) -> Result<ID> {
        let mut conn = connection(ctx).extend()?;
        let me = actor(ctx, &conn).extend()?;
        comments::add_comment(&mut conn, &me, &post_id, &content)
            .map(ID)
            .extend()
    }

    /// Bookmark or un-bookmark a post. Returns whether it is now bookmarked.
    async fn toggle_bookmark(&self, ctx: &Context<'_>, post_id: ID) -> Result<bool> {
        let mut conn = connection(ctx).extend()?;
        let me = actor(ctx, &conn).extend()?;
        bookmarks::toggle_bookmark(&mut conn, &me, &post_id).extend()
    }
}
