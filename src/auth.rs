use rusqlite::Connection;

use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::social::users;

/// Verified subject identifier issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject(pub String);

impl Subject {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Map the request's subject to the acting user.
///
/// No subject means the caller never authenticated. A subject without a
/// user record means sign-up has not been synced yet.
pub fn resolve_actor(conn: &Connection, subject: Option<&Subject>) -> AppResult<User> {
    let subject = subject.ok_or(AppError::NotAuthenticated)?;
    users::find_by_subject(conn, subject.as_str())?.ok_or(AppError::NotFound("User"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;
    use crate::social::testing;

    #[test]
    fn missing_subject_is_not_authenticated() {
        let conn = test_connection();
        assert!(matches!(
            resolve_actor(&conn, None).unwrap_err(),
            AppError::NotAuthenticated
        ));
    }

    #[test]
    fn unknown_subject_is_not_found() {
        let conn = test_connection();
        let subject = Subject("sub-nobody".into());
        assert!(matches!(
            resolve_actor(&conn, Some(&subject)).unwrap_err(),
            AppError::NotFound("User")
        ));
    }

    #[test]
    fn known_subject_resolves_to_user() {
        let mut conn = test_connection();
        let alice = testing::user(&mut conn, "alice");
        let actor = resolve_actor(&conn, Some(&Subject(alice.subject.clone()))).unwrap();
        assert_eq!(actor.id, alice.id);
    }
}
