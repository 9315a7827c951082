//! Transient user notifications.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Warning,
    Error,
}

/// A short message shown to the user and then dismissed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            raised_at: Utc::now(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, message)
    }

    /// Error notification carrying the user-facing text of `err`.
    pub fn from_error(err: &AppError) -> Self {
        Self::error(err.user_message())
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.level {
            NotificationLevel::Success => "ok",
            NotificationLevel::Warning => "warning",
            NotificationLevel::Error => "error",
        };
        write!(f, "[{level}] {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MISSING_ROOT_HINT;

    #[test]
    fn test_from_error_uses_user_message() {
        let notification = Notification::from_error(&AppError::MissingRoot);
        assert_eq!(notification.level, NotificationLevel::Error);
        assert_eq!(notification.message, MISSING_ROOT_HINT);
        assert!(notification.to_string().starts_with("[error] "));
    }
}
