//! Wire types of the resource API (`/users`, `/video/reports`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Driver,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub dni: String,
    pub status: UserStatus,
    pub role: UserRole,
    #[serde(default)]
    pub url_video: Option<String>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_active_driver(&self) -> bool {
        self.role == UserRole::Driver && self.status == UserStatus::Active
    }

    /// Recorded monitoring needs a video source assigned on the server.
    pub fn has_video_source(&self) -> bool {
        self.url_video
            .as_deref()
            .map(|url| !url.trim().is_empty())
            .unwrap_or(false)
    }
}

/// One stored analysis result joined with its user, as listed by `/video/reports`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub dni: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub blinks_detected: u32,
    #[serde(default)]
    pub microsleeps: f64,
    #[serde(default)]
    pub yawns_detected: u32,
    #[serde(default)]
    pub yawns_duration: f64,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_user_payload() {
        let user: User = serde_json::from_str(
            r#"{
                "id": 7, "username": "jperez", "first_name": "Juan", "last_name": "Perez",
                "email": "j@example.com", "phone_number": "999", "dni": "12345678",
                "status": "active", "role": "driver", "url_video": "http://cam/1.mp4"
            }"#,
        )
        .unwrap();

        assert!(user.is_active_driver());
        assert!(user.has_video_source());
        assert_eq!(user.full_name(), "Juan Perez");
    }

    #[test]
    fn blank_video_url_is_not_a_source() {
        let user: User = serde_json::from_str(
            r#"{
                "id": 1, "username": "a", "first_name": "A", "last_name": "B",
                "email": "", "phone_number": "", "dni": "", "status": "inactive",
                "role": "driver", "url_video": "  "
            }"#,
        )
        .unwrap();

        assert!(!user.has_video_source());
        assert!(!user.is_active_driver());
    }

    #[test]
    fn report_defaults_missing_counters() {
        let report: Report =
            serde_json::from_str(r#"{"id": 1, "user_id": 2, "first_name": "Ana"}"#).unwrap();

        assert_eq!(report.blinks_detected, 0);
        assert_eq!(report.microsleeps, 0.0);
        assert!(report.created_at.is_none());
    }
}
