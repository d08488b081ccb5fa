//! Domain entities of the detective agency API.
//!
//! # Design
//! These types mirror the mock-server's schema but are defined independently;
//! the scenario tests catch drift between the two. Field names travel as
//! camelCase JSON. Every entity carries `#[serde(default)]` so a response that
//! omits a field decodes to the entity's documented default instead of
//! failing. Enum-like fields stay `String` on purpose: the validator is the
//! place that judges membership, and a server bug should show up as a
//! violation rather than as an undecodable body.

use std::ops::RangeInclusive;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const DETECTIVE_STATUSES: &[&str] = &["active", "inactive"];
pub const CASE_STATUSES: &[&str] = &["open", "in-progress", "closed"];
pub const CASE_PRIORITIES: &[&str] = &["low", "medium", "high", "critical"];
pub const ABILITY_TYPES: &[&str] = &["offensive", "defensive", "support", "special"];
pub const ABILITY_RANGES: &[&str] = &["Touch", "10 meters", "50 meters", "Unlimited"];
pub const ABILITY_ACTIVATIONS: &[&str] = &["Passive", "Voluntary", "Automatic"];

pub const DANGER_LEVELS: RangeInclusive<i32> = 1..=10;
pub const DETECTIVE_AGES: RangeInclusive<i32> = 1..=150;

/// Anything the API stores under a server-assigned id.
pub trait Entity {
    /// Kind name used in client and cleanup log lines ("ability", "case", ...).
    const KIND: &'static str;

    fn id(&self) -> &str;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Detective {
    pub id: String,
    pub name: String,
    pub name_en: String,
    pub role: String,
    pub ability: String,
    pub ability_id: String,
    pub description: String,
    pub image: String,
    pub status: String,
    pub age: i32,
    pub joined_at: String,
}

impl Default for Detective {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            name_en: String::new(),
            role: String::new(),
            ability: String::new(),
            ability_id: String::new(),
            description: String::new(),
            image: String::new(),
            status: "active".to_string(),
            age: 0,
            joined_at: String::new(),
        }
    }
}

impl Entity for Detective {
    const KIND: &'static str = "detective";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Case {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub assigned_to: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    pub location: String,
    /// Absent on the wire when `None`; never sent as zero. Travels as a JSON
    /// float, so amounts beyond f64 precision (about 15 significant digits)
    /// are rounded on the way through.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward: Option<Decimal>,
}

impl Default for Case {
    fn default() -> Self {
        Self {
            id: String::new(),
            title: String::new(),
            description: String::new(),
            status: "open".to_string(),
            priority: "medium".to_string(),
            assigned_to: Vec::new(),
            created_at: String::new(),
            updated_at: String::new(),
            location: String::new(),
            reward: None,
        }
    }
}

impl Entity for Case {
    const KIND: &'static str = "case";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Ability {
    pub id: String,
    pub name: String,
    pub name_en: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub danger_level: i32,
    pub range: String,
    pub activation: String,
}

impl Default for Ability {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            name_en: String::new(),
            kind: "special".to_string(),
            description: String::new(),
            danger_level: 1,
            range: String::new(),
            activation: String::new(),
        }
    }
}

impl Entity for Ability {
    const KIND: &'static str = "ability";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Request payload for `POST /api/auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

/// Session returned by a successful login.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuthResponse {
    pub message: String,
    pub user: User,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct User {
    pub id: String,
    pub username: String,
    pub role: String,
}

/// Partial update for a detective. Only the fields present in the JSON are
/// applied; omitted fields remain unchanged on the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectivePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CasePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbilityPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub danger_level: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
