use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{AppError, AppResult};

/// How upload URLs are issued.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub public_url: String,
    pub ticket_minutes: i64,
}

impl UploadPolicy {
    pub fn upload_url(&self, token: &str) -> String {
        format!("{}/uploads/{}", self.public_url, token)
    }
}

/// Random 32-byte hex token.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// Issue a single-use upload ticket for `user_id`. Returns the token.
pub fn issue_ticket(conn: &Connection, user_id: &str, policy: &UploadPolicy) -> AppResult<String> {
    let token = generate_token();
    let now = Utc::now();
    let expires_at = now + Duration::minutes(policy.ticket_minutes);

    // Expired tickets are never redeemable, so sweep them while we're here.
    conn.execute(
        "DELETE FROM upload_tickets WHERE expires_at < ?1",
        params![now.to_rfc3339_opts(SecondsFormat::Micros, true)],
    )?;
    conn.execute(
        "INSERT INTO upload_tickets (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
        params![
            token,
            user_id,
            expires_at.to_rfc3339_opts(SecondsFormat::Micros, true)
        ],
    )?;

    Ok(token)
}

/// Consume a ticket, returning the user it was issued to.
///
/// A ticket works once: it is deleted whether or not it had expired.
pub fn redeem_ticket(conn: &Connection, token: &str) -> AppResult<String> {
    let ticket: Option<(String, String)> = conn
        .query_row(
            "DELETE FROM upload_tickets WHERE token = ?1 RETURNING user_id, expires_at",
            params![token],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let (user_id, expires_at) = ticket.ok_or(AppError::NotFound("Upload ticket"))?;
    let expires_at = DateTime::parse_from_rfc3339(&expires_at)
        .map_err(|e| AppError::Internal(format!("Bad ticket expiry: {}", e)))?;

    if expires_at.with_timezone(&Utc) < Utc::now() {
        return Err(AppError::NotAuthorized);
    }

    Ok(user_id)
}
