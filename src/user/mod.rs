mod service;
mod store;

pub use service::*;
pub use store::*;

use std::sync::LazyLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

/// Sentinel asset name for accounts without an uploaded picture.
pub const DEFAULT_PROFILE_PIC: &str = "default.png";

static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{10}$").expect("phone regex"));

/// Phone numbers are exactly 10 decimal digits.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if PHONE.is_match(phone) {
        Ok(())
    } else {
        Err(ValidationError::new("phone"))
    }
}

/// User as saved on database.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip)]
    pub password: String,
    pub phone: String,
    pub profile_pic: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Candidate record for [`UserStore::create`].
///
/// `password` carries an already-hashed PHC string; the store never inspects
/// field semantics, callers hash before the write.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 1, message = "First name is required."))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required."))]
    pub last_name: String,
    #[validate(email(message = "Email must be formatted."))]
    pub email: String,
    pub password: String,
    #[validate(custom(
        function = "crate::user::validate_phone",
        message = "Phone number must be 10 digits."
    ))]
    pub phone: String,
}

impl NewUser {
    /// Trim and case-normalize fields, then run the field rules.
    pub fn normalized(mut self) -> Result<Self, ValidationErrors> {
        self.first_name = self.first_name.trim().to_owned();
        self.last_name = self.last_name.trim().to_owned();
        self.email = self.email.trim().to_lowercase();
        self.phone = self.phone.trim().to_owned();
        self.validate()?;
        Ok(self)
    }
}

/// Partial field set for [`UserStore::update`].
///
/// Absent fields are left untouched; supplied fields go through the same
/// rules as creation. A `password` value, when present, must already be
/// hashed by the caller.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UserUpdate {
    #[validate(length(min = 1, message = "First name is required."))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, message = "Last name is required."))]
    pub last_name: Option<String>,
    #[validate(email(message = "Email must be formatted."))]
    pub email: Option<String>,
    pub password: Option<String>,
    #[validate(custom(
        function = "crate::user::validate_phone",
        message = "Phone number must be 10 digits."
    ))]
    pub phone: Option<String>,
    pub profile_pic: Option<String>,
}

impl UserUpdate {
    /// Trim and case-normalize supplied fields, then run the field rules.
    pub fn normalized(mut self) -> Result<Self, ValidationErrors> {
        self.first_name = self.first_name.map(|v| v.trim().to_owned());
        self.last_name = self.last_name.map(|v| v.trim().to_owned());
        self.email = self.email.map(|v| v.trim().to_lowercase());
        self.phone = self.phone.map(|v| v.trim().to_owned());
        self.validate()?;
        Ok(self)
    }

    /// Merge supplied fields over an existing record.
    fn apply_to(self, user: &mut User) {
        if let Some(first_name) = self.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            user.last_name = last_name;
        }
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(password) = self.password {
            user.password = password;
        }
        if let Some(phone) = self.phone {
            user.phone = phone;
        }
        if let Some(profile_pic) = self.profile_pic {
            user.profile_pic = profile_pic;
        }
    }
}
