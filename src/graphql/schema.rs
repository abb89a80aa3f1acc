use std::sync::Arc;

use async_graphql::{EmptySubscription, Schema};

use super::mutations::MutationRoot;
use super::queries::QueryRoot;
use crate::blobs::{BlobStore, UploadPolicy};
use crate::state::DbPool;

/// GraphQL Schema type
pub type SocialSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Build the GraphQL schema around the shared collaborators.
/// The caller's [`Subject`](crate::auth::Subject) is attached per request.
pub fn build_schema(db: DbPool, blobs: Arc<dyn BlobStore>, uploads: UploadPolicy) -> SocialSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(db)
        .data(blobs)
        .data(uploads)
        .finish()
}
