use async_graphql::*;

use crate::social::users::{NewUser, ProfilePatch};

/// Input for syncing a newly signed-up identity into a user record
#[derive(InputObject)]
pub struct CreateUserInput {
    pub username: String,
    pub fullname: String,
    pub email: String,
    pub bio: Option<String>,
    /// Avatar URL supplied by the identity provider
    pub image: String,
}

impl From<CreateUserInput> for NewUser {
    fn from(input: CreateUserInput) -> Self {
        NewUser {
            username: input.username,
            fullname: input.fullname,
            email: input.email,
            bio: input.bio,
            image: input.image,
        }
    }
}

/// Profile fields to change; omitted fields stay as they are
#[derive(InputObject, Default)]
pub struct UpdateUserInput {
    pub username: Option<String>,
    pub fullname: Option<String>,
    pub bio: Option<String>,
}

impl From<UpdateUserInput> for ProfilePatch {
    fn from(input: UpdateUserInput) -> Self {
        ProfilePatch {
            username: input.username,
            fullname: input.fullname,
            bio: input.bio,
        }
    }
}

/// Input for publishing a post from an uploaded image
#[derive(InputObject)]
pub struct CreatePostInput {
    /// Storage id returned by the upload endpoint
    pub storage_id: ID,
    pub caption: Option<String>,
}
