//! In-memory stand-in for the detective agency API.
//!
//! Serves `/api/detectives`, `/api/cases` and `/api/abilities` with the
//! usual list/create/get/update/delete routes, plus `POST /api/auth/login`.
//! Collections keep insertion order and start with one seeded record each.
//! Updates are partial: the JSON object sent is merged over the stored
//! record, so omitted fields keep their values.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin123";

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
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

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
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
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward: Option<f64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
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

#[derive(Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub message: String,
}

type Failure = (StatusCode, Json<Message>);

fn failure(status: StatusCode, message: impl Into<String>) -> Failure {
    (
        status,
        Json(Message {
            message: message.into(),
        }),
    )
}

/// A stored collection member.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: &'static str;

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    fn collection(db: &Db) -> &RwLock<Vec<Self>>;

    /// Server-side checks on a create or merged update.
    fn check(&self) -> Result<(), String> {
        Ok(())
    }

    fn touch(&mut self, _now: &str, _created: bool) {}
}

impl Record for Detective {
    const KIND: &'static str = "Detective";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn collection(db: &Db) -> &RwLock<Vec<Self>> {
        &db.detectives
    }

    fn check(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        Ok(())
    }

    fn touch(&mut self, now: &str, created: bool) {
        if created && self.joined_at.is_empty() {
            self.joined_at = now.get(..10).unwrap_or(now).to_string();
        }
    }
}

impl Record for Case {
    const KIND: &'static str = "Case";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn collection(db: &Db) -> &RwLock<Vec<Self>> {
        &db.cases
    }

    fn check(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title is required".to_string());
        }
        if self.reward.is_some_and(|r| r < 0.0) {
            return Err("reward must not be negative".to_string());
        }
        Ok(())
    }

    fn touch(&mut self, now: &str, created: bool) {
        if created && self.created_at.is_empty() {
            self.created_at = now.to_string();
        }
        self.updated_at = now.to_string();
    }
}

impl Record for Ability {
    const KIND: &'static str = "Ability";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn collection(db: &Db) -> &RwLock<Vec<Self>> {
        &db.abilities
    }

    fn check(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        if !(1..=10).contains(&self.danger_level) {
            return Err("dangerLevel must be between 1 and 10".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Db {
    pub detectives: RwLock<Vec<Detective>>,
    pub cases: RwLock<Vec<Case>>,
    pub abilities: RwLock<Vec<Ability>>,
}

impl Db {
    /// One record per collection, with stable ids.
    pub fn seeded() -> Self {
        let now = now();
        Self {
            detectives: RwLock::new(vec![Detective {
                id: "1".to_string(),
                name: "Edogawa Ranpo".to_string(),
                name_en: "Ranpo Edogawa".to_string(),
                role: "Detective".to_string(),
                ability: "Super Deduction".to_string(),
                ability_id: "1".to_string(),
                description: "Self-proclaimed greatest detective".to_string(),
                image: "/ranpo.jpg".to_string(),
                status: "active".to_string(),
                age: 26,
                joined_at: "2020-04-01".to_string(),
            }]),
            cases: RwLock::new(vec![Case {
                id: "1".to_string(),
                title: "The Azure Messenger".to_string(),
                description: "Serial bombing threats across the city".to_string(),
                status: "open".to_string(),
                priority: "high".to_string(),
                assigned_to: vec!["1".to_string()],
                created_at: now.clone(),
                updated_at: now,
                location: "Yokohama".to_string(),
                reward: Some(1_000_000.0),
            }]),
            abilities: RwLock::new(vec![Ability {
                id: "1".to_string(),
                name: "Super Deduction".to_string(),
                name_en: "Ultra Deduction".to_string(),
                kind: "support".to_string(),
                description: "Sees the truth at a glance".to_string(),
                danger_level: 1,
                range: "Unlimited".to_string(),
                activation: "Voluntary".to_string(),
            }]),
        }
    }
}

pub type SharedDb = Arc<Db>;

pub fn app() -> Router {
    app_with(Db::seeded())
}

pub fn app_with(db: Db) -> Router {
    Router::new()
        .route("/api/detectives", get(list::<Detective>).post(create::<Detective>))
        .route(
            "/api/detectives/{id}",
            get(fetch::<Detective>).put(update::<Detective>).delete(remove::<Detective>),
        )
        .route("/api/cases", get(list::<Case>).post(create::<Case>))
        .route(
            "/api/cases/{id}",
            get(fetch::<Case>).put(update::<Case>).delete(remove::<Case>),
        )
        .route("/api/abilities", get(list::<Ability>).post(create::<Ability>))
        .route(
            "/api/abilities/{id}",
            get(fetch::<Ability>).put(update::<Ability>).delete(remove::<Ability>),
        )
        .route("/api/auth/login", post(login))
        .with_state(Arc::new(db))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    serve(listener, Db::seeded()).await
}

pub async fn serve(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(db)).await
}

fn now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

fn not_found<R: Record>() -> Failure {
    failure(StatusCode::NOT_FOUND, format!("{} not found", R::KIND))
}

async fn list<R: Record>(State(db): State<SharedDb>) -> Json<Vec<R>> {
    Json(R::collection(&db).read().await.clone())
}

async fn fetch<R: Record>(
    State(db): State<SharedDb>,
    Path(id): Path<String>,
) -> Result<Json<R>, Failure> {
    let records = R::collection(&db).read().await;
    records
        .iter()
        .find(|r| r.id() == id)
        .cloned()
        .map(Json)
        .ok_or_else(not_found::<R>)
}

async fn create<R: Record>(
    State(db): State<SharedDb>,
    Json(mut input): Json<R>,
) -> Result<(StatusCode, Json<R>), Failure> {
    input.check().map_err(|m| failure(StatusCode::BAD_REQUEST, m))?;
    input.set_id(Uuid::new_v4().to_string());
    input.touch(&now(), true);
    R::collection(&db).write().await.push(input.clone());
    Ok((StatusCode::CREATED, Json(input)))
}

async fn update<R: Record>(
    State(db): State<SharedDb>,
    Path(id): Path<String>,
    Json(patch): Json<Value>,
) -> Result<Json<R>, Failure> {
    let Value::Object(fields) = patch else {
        return Err(failure(StatusCode::UNPROCESSABLE_ENTITY, "expected a JSON object"));
    };

    let mut records = R::collection(&db).write().await;
    let slot = records
        .iter_mut()
        .find(|r| r.id() == id)
        .ok_or_else(not_found::<R>)?;

    let mut merged = serde_json::to_value(&*slot)
        .map_err(|e| failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    if let Value::Object(current) = &mut merged {
        for (key, value) in fields {
            if key != "id" {
                current.insert(key, value);
            }
        }
    }
    let mut updated: R = serde_json::from_value(merged)
        .map_err(|e| failure(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
    updated.check().map_err(|m| failure(StatusCode::BAD_REQUEST, m))?;
    updated.touch(&now(), false);
    *slot = updated.clone();
    Ok(Json(updated))
}

async fn remove<R: Record>(
    State(db): State<SharedDb>,
    Path(id): Path<String>,
) -> Result<StatusCode, Failure> {
    let mut records = R::collection(&db).write().await;
    let index = records
        .iter()
        .position(|r| r.id() == id)
        .ok_or_else(not_found::<R>)?;
    records.remove(index);
    Ok(StatusCode::NO_CONTENT)
}

async fn login(Json(input): Json<Credentials>) -> Result<Json<Value>, Failure> {
    if input.username == ADMIN_USERNAME && input.password == ADMIN_PASSWORD {
        Ok(Json(serde_json::json!({
            "message": "Login successful",
            "user": { "id": "1", "username": ADMIN_USERNAME, "role": "admin" }
        })))
    } else {
        Err(failure(StatusCode::UNAUTHORIZED, "Invalid credentials"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ability_uses_type_key_and_camel_case() {
        let ability = Ability {
            kind: "offensive".to_string(),
            danger_level: 4,
            ..Ability::default()
        };
        let json = serde_json::to_value(&ability).unwrap();
        assert_eq!(json["type"], "offensive");
        assert_eq!(json["dangerLevel"], 4);
        assert!(json.get("kind").is_none());
    }

    #[test]
    fn case_without_reward_omits_the_key() {
        let json = serde_json::to_value(Case::default()).unwrap();
        assert!(json.get("reward").is_none());
        assert!(json.get("assignedTo").is_some());
    }

    #[test]
    fn partial_input_takes_defaults() {
        let case: Case = serde_json::from_str(r#"{"title":"Only a title"}"#).unwrap();
        assert_eq!(case.title, "Only a title");
        assert_eq!(case.reward, None);
        assert!(case.assigned_to.is_empty());
    }

    #[test]
    fn checks_reject_bad_records() {
        let ability = Ability {
            name: "X".to_string(),
            danger_level: 11,
            ..Ability::default()
        };
        assert!(ability.check().is_err());
        let case = Case {
            title: "T".to_string(),
            reward: Some(-1.0),
            ..Case::default()
        };
        assert!(case.check().is_err());
        assert!(Detective::default().check().is_err());
    }

    #[test]
    fn touch_stamps_case_times() {
        let mut case = Case::default();
        case.touch("2024-05-01T10:00:00Z", true);
        assert_eq!(case.created_at, "2024-05-01T10:00:00Z");
        case.touch("2024-05-02T10:00:00Z", false);
        assert_eq!(case.created_at, "2024-05-01T10:00:00Z");
        assert_eq!(case.updated_at, "2024-05-02T10:00:00Z");
    }

    #[test]
    fn seeded_db_has_one_of_each() {
        let db = Db::seeded();
        assert_eq!(db.detectives.try_read().unwrap().len(), 1);
        assert_eq!(db.cases.try_read().unwrap().len(), 1);
        assert_eq!(db.abilities.try_read().unwrap().len(), 1);
    }
}
