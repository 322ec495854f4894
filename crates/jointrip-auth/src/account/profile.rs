//! Partial profile updates.
//!
//! A [`ProfileUpdate`] is an ordered list of typed field mutations. It can be
//! built directly or from a loosely-typed JSON object submitted by a client,
//! in which case the [`UnknownFieldPolicy`] decides what happens to keys that
//! are not recognised or carry a value of the wrong type.
//!
//! # Example
//!
//! ```ignore
//! use jointrip_auth::account::{ProfileUpdate, UnknownFieldPolicy};
//!
//! let body = serde_json::json!({"bio": "Backpacking since 2009", "phone": null});
//! let update = ProfileUpdate::from_json(body.as_object().unwrap(), UnknownFieldPolicy::Reject)?;
//! update.apply(&mut account, now);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use super::{Account, Gender, PrivacyLevel, TravelStyle};

/// Errors raised while building a profile update.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileUpdateError {
    /// The key is not an updatable profile field.
    #[error("Unknown profile field: {field}")]
    UnknownField {
        /// The offending key.
        field: String,
    },

    /// The value has the wrong type or is out of range.
    #[error("Invalid value for profile field '{field}': {message}")]
    InvalidValue {
        /// The offending key.
        field: String,
        /// Why the value was rejected.
        message: String,
    },
}

/// What to do with unrecognised keys and ill-typed values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownFieldPolicy {
    /// Skip them.
    #[default]
    Ignore,
    /// Fail the whole update.
    Reject,
}

/// A single recognised profile mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum ProfileField {
    /// Given name. Must not be blank.
    FirstName(String),
    /// Family name.
    LastName(String),
    /// Free-form biography.
    Bio(String),
    /// Home location.
    Location(String),
    /// Personal website.
    Website(String),
    /// Phone number; `None` clears it.
    Phone(Option<String>),
    /// Gender; `None` clears it.
    Gender(Option<Gender>),
    /// Spoken languages, replacing the current list.
    Languages(Vec<String>),
    /// Travel interests, replacing the current list.
    Interests(Vec<String>),
    /// Preferred travel style; `None` clears it.
    TravelStyle(Option<TravelStyle>),
    /// Who may see the profile.
    ProfileVisibility(PrivacyLevel),
    /// E-mail notification opt-in.
    EmailNotifications(bool),
    /// Push notification opt-in.
    PushNotifications(bool),
}

impl ProfileField {
    /// Returns the wire name of the field.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::FirstName(_) => "first_name",
            Self::LastName(_) => "last_name",
            Self::Bio(_) => "bio",
            Self::Location(_) => "location",
            Self::Website(_) => "website",
            Self::Phone(_) => "phone",
            Self::Gender(_) => "gender",
            Self::Languages(_) => "languages",
            Self::Interests(_) => "interests",
            Self::TravelStyle(_) => "travel_style",
            Self::ProfileVisibility(_) => "profile_visibility",
            Self::EmailNotifications(_) => "email_notifications",
            Self::PushNotifications(_) => "push_notifications",
        }
    }

    /// Parses one key/value pair.
    ///
    /// Returns `Ok(None)` for a key that is not a profile field.
    fn parse(key: &str, value: &Value) -> Result<Option<Self>, String> {
        let field = match key {
            "first_name" => {
                let name = string(value)?;
                if name.trim().is_empty() {
                    return Err("first name cannot be empty".to_string());
                }
                Self::FirstName(name)
            }
            "last_name" => Self::LastName(string(value)?),
            "bio" => Self::Bio(string(value)?),
            "location" => Self::Location(string(value)?),
            "website" => Self::Website(string(value)?),
            "phone" => Self::Phone(nullable(value, string)?),
            "gender" => Self::Gender(nullable(value, typed)?),
            "languages" => Self::Languages(string_list(value)?),
            "interests" => Self::Interests(string_list(value)?),
            "travel_style" => Self::TravelStyle(nullable(value, typed)?),
            "profile_visibility" => Self::ProfileVisibility(typed(value)?),
            "email_notifications" => Self::EmailNotifications(boolean(value)?),
            "push_notifications" => Self::PushNotifications(boolean(value)?),
            _ => return Ok(None),
        };
        Ok(Some(field))
    }

    fn apply(self, account: &mut Account) {
        match self {
            Self::FirstName(v) => account.first_name = v,
            Self::LastName(v) => account.last_name = v,
            Self::Bio(v) => account.bio = v,
            Self::Location(v) => account.location = v,
            Self::Website(v) => account.website = v,
            Self::Phone(v) => account.phone = v,
            Self::Gender(v) => account.gender = v,
            Self::Languages(v) => account.languages = v,
            Self::Interests(v) => account.interests = v,
            Self::TravelStyle(v) => account.travel_style = v,
            Self::ProfileVisibility(v) => account.profile_visibility = v,
            Self::EmailNotifications(v) => account.email_notifications = v,
            Self::PushNotifications(v) => account.push_notifications = v,
        }
    }
}

fn string(value: &Value) -> Result<String, String> {
    value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| format!("expected a string, got {}", type_name(value)))
}

fn boolean(value: &Value) -> Result<bool, String> {
    value
        .as_bool()
        .ok_or_else(|| format!("expected a boolean, got {}", type_name(value)))
}

fn string_list(value: &Value) -> Result<Vec<String>, String> {
    let items = value
        .as_array()
        .ok_or_else(|| format!("expected an array of strings, got {}", type_name(value)))?;
    items.iter().map(string).collect()
}

fn typed<T: serde::de::DeserializeOwned>(value: &Value) -> Result<T, String> {
    T::deserialize(value).map_err(|e| e.to_string())
}

fn nullable<T>(
    value: &Value,
    parse: impl Fn(&Value) -> Result<T, String>,
) -> Result<Option<T>, String> {
    if value.is_null() {
        Ok(None)
    } else {
        parse(value).map(Some)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// An ordered set of profile mutations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    fields: Vec<ProfileField>,
}

impl ProfileUpdate {
    /// Creates an empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a mutation.
    #[must_use]
    pub fn with(mut self, field: ProfileField) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds a mutation in place.
    pub fn push(&mut self, field: ProfileField) {
        self.fields.push(field);
    }

    /// Returns the mutations in application order.
    #[must_use]
    pub fn fields(&self) -> &[ProfileField] {
        &self.fields
    }

    /// Returns `true` if the update has no mutations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the number of mutations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Builds an update from a JSON object.
    ///
    /// # Errors
    ///
    /// With [`UnknownFieldPolicy::Reject`], returns
    /// `ProfileUpdateError::UnknownField` for an unrecognised key and
    /// `ProfileUpdateError::InvalidValue` for an ill-typed value. With
    /// [`UnknownFieldPolicy::Ignore`] such entries are skipped.
    pub fn from_json(
        object: &Map<String, Value>,
        policy: UnknownFieldPolicy,
    ) -> Result<Self, ProfileUpdateError> {
        let mut update = Self::new();

        for (key, value) in object {
            match ProfileField::parse(key, value) {
                Ok(Some(field)) => update.push(field),
                Ok(None) => match policy {
                    UnknownFieldPolicy::Reject => {
                        return Err(ProfileUpdateError::UnknownField { field: key.clone() });
                    }
                    UnknownFieldPolicy::Ignore => {
                        tracing::debug!(field = %key, "Ignoring unknown profile field");
                    }
                },
                Err(message) => match policy {
                    UnknownFieldPolicy::Reject => {
                        return Err(ProfileUpdateError::InvalidValue {
                            field: key.clone(),
                            message,
                        });
                    }
                    UnknownFieldPolicy::Ignore => {
                        tracing::debug!(field = %key, %message, "Ignoring invalid profile value");
                    }
                },
            }
        }

        Ok(update)
    }

    /// Applies every mutation to `account`.
    ///
    /// A non-empty update also recomputes the profile completion and stamps
    /// `updated_at`. An empty update leaves the account untouched.
    pub fn apply(&self, account: &mut Account, now: OffsetDateTime) {
        if self.is_empty() {
            return;
        }
        for field in &self.fields {
            field.clone().apply(account);
        }
        account.calculate_profile_completion(now);
    }
}

impl From<Vec<ProfileField>> for ProfileUpdate {
    fn from(fields: Vec<ProfileField>) -> Self {
        Self { fields }
    }
}
