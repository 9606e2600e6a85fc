//! Issues a signed session token for an operator-chosen role and subject.
//!
//! Admin tokens have no sign-up flow, so this is how an operator gets one.

use chrono::{DateTime, Utc};
use goldsmith_core::flows::ActorRole;
use goldsmith_core::session::SessionSigner;
use serde::Serialize;

use crate::commands::{load_config, CommandResult};

#[derive(Debug, Serialize)]
struct IssuedSession {
    command: &'static str,
    status: &'static str,
    role: ActorRole,
    subject_id: String,
    token: String,
    expires_at: DateTime<Utc>,
}

pub fn run(role: &str, subject: &str) -> CommandResult {
    let role = match role.parse::<ActorRole>() {
        Ok(role) => role,
        Err(error) => {
            return CommandResult::failure("issue-session", "invalid_argument", error.to_string(), 2)
        }
    };
    let config = match load_config("issue-session") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let signer = SessionSigner::new(config.session.signing_secret.clone(), config.session.ttl_secs);
    let (token, claims) = match signer.issue(role, subject, Utc::now()) {
        Ok(issued) => issued,
        Err(error) => {
            return CommandResult::failure("issue-session", "invalid_argument", error.to_string(), 2)
        }
    };

    let payload = IssuedSession {
        command: "issue-session",
        status: "ok",
        role: claims.role,
        subject_id: claims.subject_id,
        token,
        expires_at: claims.expires_at,
    };
    match serde_json::to_string(&payload) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => CommandResult::failure("issue-session", "serialization", error.to_string(), 3),
    }
}
