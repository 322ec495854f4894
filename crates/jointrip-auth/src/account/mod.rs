//! Local user accounts.
//!
//! An account is created the first time an external identity is seen and
//! is never physically deleted; deactivation is a soft delete. The external
//! identity id and the e-mail address are each unique among active
//! accounts, which the registry enforces.

pub mod profile;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::error::AuthError;
use crate::identity::ExternalProfile;

pub use profile::{ProfileField, ProfileUpdate, ProfileUpdateError, UnknownFieldPolicy};

/// Number of fields counted by [`Account::calculate_profile_completion`].
const PROFILE_COMPLETION_FIELDS: u32 = 12;

/// Who can see an account's profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyLevel {
    /// Visible to everyone.
    #[default]
    Public,
    /// Visible to connections only.
    Friends,
    /// Visible to the owner only.
    Private,
}

/// Preferred way of travelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TravelStyle {
    Budget,
    MidRange,
    Luxury,
    Backpacker,
    Adventure,
    Cultural,
    Relaxation,
}

/// Self-declared gender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
    PreferNotToSay,
}

/// A local user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Internal id.
    pub id: Uuid,

    /// Subject identifier at the identity provider.
    pub external_id: String,

    /// E-mail address.
    pub email: String,

    /// Display handle. Not guaranteed unique.
    pub username: String,

    pub first_name: String,

    pub last_name: String,

    pub phone: Option<String>,

    pub gender: Option<Gender>,

    pub bio: String,

    pub location: String,

    pub website: String,

    /// Spoken languages, in the order the user listed them.
    pub languages: Vec<String>,

    /// Travel interests, in the order the user listed them.
    pub interests: Vec<String>,

    pub travel_style: Option<TravelStyle>,

    /// Photo shown on the profile; initially the provider photo.
    pub profile_photo_url: String,

    /// Photo reported by the identity provider.
    pub provider_photo_url: String,

    pub privacy_level: PrivacyLevel,

    pub profile_visibility: PrivacyLevel,

    pub email_notifications: bool,

    pub push_notifications: bool,

    /// Percentage of filled profile fields, 0 to 100.
    pub profile_completion: u8,

    /// Cleared on soft delete.
    pub active: bool,

    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login_at: Option<OffsetDateTime>,

    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Account {
    /// Creates an account from a freshly resolved external identity.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidProfile` if the external id, e-mail, or
    /// given name is empty.
    pub fn from_profile(profile: &ExternalProfile, now: OffsetDateTime) -> AuthResult<Self> {
        if profile.external_id.is_empty() {
            return Err(AuthError::invalid_profile("external id is required"));
        }
        if profile.email.is_empty() {
            return Err(AuthError::invalid_profile("email is required"));
        }
        if profile.given_name.is_empty() {
            return Err(AuthError::invalid_profile("first name is required"));
        }

        let photo = profile.picture_url.clone().unwrap_or_default();

        Ok(Self {
            id: Uuid::new_v4(),
            external_id: profile.external_id.clone(),
            email: profile.email.clone(),
            username: generate_username(&profile.given_name, &profile.family_name),
            first_name: profile.given_name.clone(),
            last_name: profile.family_name.clone(),
            phone: None,
            gender: None,
            bio: String::new(),
            location: String::new(),
            website: String::new(),
            languages: Vec::new(),
            interests: Vec::new(),
            travel_style: None,
            profile_photo_url: photo.clone(),
            provider_photo_url: photo,
            privacy_level: PrivacyLevel::Public,
            profile_visibility: PrivacyLevel::Public,
            email_notifications: true,
            push_notifications: true,
            profile_completion: 0,
            active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Records a successful login.
    pub fn record_login(&mut self, now: OffsetDateTime) {
        self.last_login_at = Some(now);
        self.updated_at = now;
    }

    /// Soft-deletes the account.
    pub fn deactivate(&mut self, now: OffsetDateTime) {
        self.active = false;
        self.updated_at = now;
    }

    pub fn activate(&mut self, now: OffsetDateTime) {
        self.active = true;
        self.updated_at = now;
    }

    pub fn set_privacy_level(&mut self, level: PrivacyLevel, now: OffsetDateTime) {
        self.privacy_level = level;
        self.updated_at = now;
    }

    pub fn set_notification_settings(&mut self, email: bool, push: bool, now: OffsetDateTime) {
        self.email_notifications = email;
        self.push_notifications = push;
        self.updated_at = now;
    }

    pub fn set_languages(&mut self, languages: Vec<String>, now: OffsetDateTime) {
        self.languages = languages;
        self.updated_at = now;
    }

    /// Appends a language unless already present.
    pub fn add_language(&mut self, language: impl Into<String>, now: OffsetDateTime) {
        if add_unique(&mut self.languages, language.into()) {
            self.updated_at = now;
        }
    }

    pub fn remove_language(&mut self, language: &str, now: OffsetDateTime) {
        if remove_first(&mut self.languages, language) {
            self.updated_at = now;
        }
    }

    pub fn set_interests(&mut self, interests: Vec<String>, now: OffsetDateTime) {
        self.interests = interests;
        self.updated_at = now;
    }

    /// Appends an interest unless already present.
    pub fn add_interest(&mut self, interest: impl Into<String>, now: OffsetDateTime) {
        if add_unique(&mut self.interests, interest.into()) {
            self.updated_at = now;
        }
    }

    pub fn remove_interest(&mut self, interest: &str, now: OffsetDateTime) {
        if remove_first(&mut self.interests, interest) {
            self.updated_at = now;
        }
    }

    /// Recomputes [`Account::profile_completion`] from the filled fields.
    pub fn calculate_profile_completion(&mut self, now: OffsetDateTime) {
        let filled = [
            !self.email.is_empty(),
            !self.first_name.is_empty(),
            !self.last_name.is_empty(),
            !self.profile_photo_url.is_empty(),
            !self.bio.is_empty(),
            !self.location.is_empty(),
            !self.website.is_empty(),
            self.phone.as_deref().is_some_and(|p| !p.is_empty()),
            self.gender.is_some(),
            !self.languages.is_empty(),
            !self.interests.is_empty(),
            self.travel_style.is_some(),
        ]
        .into_iter()
        .filter(|f| *f)
        .count() as u32;

        self.profile_completion = (filled * 100 / PROFILE_COMPLETION_FIELDS) as u8;
        self.updated_at = now;
    }
}

fn add_unique(list: &mut Vec<String>, value: String) -> bool {
    if list.contains(&value) {
        return false;
    }
    list.push(value);
    true
}

fn remove_first(list: &mut Vec<String>, value: &str) -> bool {
    match list.iter().position(|v| v == value) {
        Some(index) => {
            list.remove(index);
            true
        }
        None => false,
    }
}

/// Given name + family name + 8 random hex characters.
fn generate_username(given_name: &str, family_name: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{given_name}{family_name}{}", &suffix[..8])
}
