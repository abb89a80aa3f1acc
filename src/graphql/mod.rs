pub mod mutations;
pub mod queries;
pub mod schema;
pub mod types;

pub use schema::{build_schema, SocialSchema};

use std::sync::Arc;

use async_graphql::Context;
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::{self, Subject};
use crate::blobs::BlobStore;
use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

type Conn = PooledConnection<SqliteConnectionManager>;

fn connection(ctx: &Context<'_>) -> AppResult<Conn> {
    let pool = ctx
        .data::<DbPool>()
        .map_err(|e| AppError::Internal(e.message))?;
    Ok(pool.get()?)
}

fn blobs<'a>(ctx: &Context<'a>) -> AppResult<&'a Arc<dyn BlobStore>> {
    ctx.data::<Arc<dyn BlobStore>>()
        .map_err(|e| AppError::Internal(e.message))
}

/// The user making this request, from the subject attached by the HTTP layer.
fn actor(ctx: &Context<'_>, conn: &Conn) -> AppResult<User> {
    auth::resolve_actor(conn, ctx.data_opt::<Subject>())
}

/// Resolve the actor on a connection that is released before returning.
/// Use this when the resolver awaits the blob store, which draws from the same pool.
fn actor_released(ctx: &Context<'_>) -> AppResult<User> {
    let conn = connection(ctx)?;
    actor(ctx, &conn)
}

/// URL of an image the actor uploaded. Someone else's image is refused.
async fn owned_image_url(
    ctx: &Context<'_>,
    me: &User,
    storage_id: &str,
) -> AppResult<Option<String>> {
    let store = blobs(ctx)?;
    match store.owner(storage_id).await? {
        None => Ok(None),
        Some(owner) if owner != me.id => Err(AppError::NotAuthorized),
        Some(_) => store.url(storage_id).await,
    }
}
