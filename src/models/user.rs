// src/models/user.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;

/// Role-specific part of a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Role {
    Admin {
        rights: Vec<String>,
    },
    Student {
        enrollment_date: DateTime<Utc>,
        last_login: Option<DateTime<Utc>>,
    },
}

impl Role {
    /// Role name carried in tokens and stored in the 'role' column.
    pub fn name(&self) -> &'static str {
        match self {
            Role::Admin { .. } => "admin",
            Role::Student { .. } => "student",
        }
    }
}

/// A user account. Admins and students share one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,

    /// Unique login.
    pub email: String,

    pub name: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password_hash: String,

    #[serde(flatten)]
    pub role: Role,

    pub created_at: DateTime<Utc>,
}

impl User {
    /// A freshly registered student. The email is stored lowercased.
    pub fn new_student(email: &str, name: &str, password_hash: String) -> Self {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: email.trim().to_lowercase(),
            name: name.trim().to_string(),
            password_hash,
            role: Role::Student {
                enrollment_date: now,
                last_login: None,
            },
            created_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin { .. })
    }
}

/// Raw database shape of the 'users' table.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: String,
    pub admin_rights: Vec<String>,
    pub enrollment_date: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = match row.role.as_str() {
            "admin" => Role::Admin {
                rights: row.admin_rights,
            },
            "student" => Role::Student {
                enrollment_date: row.enrollment_date.unwrap_or(row.created_at),
                last_login: row.last_login,
            },
            other => {
                return Err(AppError::InternalServerError(format!(
                    "Unknown role '{}' for user {}",
                    other, row.id
                )));
            }
        };
        Ok(User {
            id: row.id,
            email: row.email,
            name: row.name,
            password_hash: row.password_hash,
            role,
            created_at: row.created_at,
        })
    }
}

/// DTO for creating a new student (Registration).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "A valid email address is required."))]
    pub email: String,
    #[validate(length(
        min = 1,
        max = 100,
        message = "Name length must be between 1 and 100 characters."
    ))]
    pub name: String,
    #[validate(length(
        min = 6,
        max = 128,
        message = "Password length must be between 6 and 128 characters."
    ))]
    pub password: String,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 254))]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}
