pub mod bootstrap;
pub mod commands;
pub mod sessions;
pub mod stats;
pub mod timer;
pub mod timetable;

use crate::infrastructure::error::AppError;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

/// Caller identity is threaded explicitly into every operation; a blank id
/// means there is no authenticated user.
pub(crate) fn require_user(user_id: &str) -> Result<&str, AppError> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(AppError::Authentication);
    }
    Ok(user_id)
}
