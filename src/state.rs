use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::blobs::BlobStore;
use crate::config::Config;
use crate::graphql::SocialSchema;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub blobs: Arc<dyn BlobStore>,
    pub graphql_schema: SocialSchema,
}
