//! Randomized, always-valid fixtures.
//!
//! Names and titles embed a v4 uuid, so two fixtures never collide even when
//! test cases run in parallel against the same server. Enum-like fields are
//! drawn uniformly from the declared sets in `types`; numeric fields stay
//! within their declared bounds. Seeding only fixes the random choices, the
//! uuid tokens stay unique.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use time::macros::format_description;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::TestConfig;
use crate::types::{
    Ability, Case, Detective, LoginCredentials, ABILITY_ACTIVATIONS, ABILITY_RANGES,
    ABILITY_TYPES, CASE_PRIORITIES, CASE_STATUSES, DANGER_LEVELS, DETECTIVE_STATUSES,
};

#[derive(Debug)]
pub struct EntityGenerator {
    rng: StdRng,
}

impl Default for EntityGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityGenerator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible choices for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn detective(&mut self) -> Detective {
        Detective {
            id: String::new(),
            name: format!("Test Detective {}", Uuid::new_v4()),
            name_en: format!("Test Detective EN {}", Uuid::new_v4()),
            role: "Detective".to_string(),
            ability: "Test Ability".to_string(),
            ability_id: "1".to_string(),
            description: "Test Description for detective".to_string(),
            image: "/test.jpg".to_string(),
            status: pick(&mut self.rng, DETECTIVE_STATUSES),
            age: self.rng.gen_range(20..50),
            joined_at: today(),
        }
    }

    pub fn case(&mut self) -> Case {
        let now = now_rfc3339();
        Case {
            id: String::new(),
            title: format!("Test Case {}", Uuid::new_v4()),
            description: format!("Test Case Description {}", Uuid::new_v4()),
            status: pick(&mut self.rng, CASE_STATUSES),
            priority: pick(&mut self.rng, CASE_PRIORITIES),
            assigned_to: vec!["1".to_string()],
            created_at: now.clone(),
            updated_at: now,
            location: format!("Test Location {}", Uuid::new_v4()),
            reward: Some(Decimal::from(self.rng.gen_range(1000i64..100_000))),
        }
    }

    pub fn ability(&mut self) -> Ability {
        Ability {
            id: String::new(),
            name: format!("Test Ability {}", Uuid::new_v4()),
            name_en: format!("Test Ability EN {}", Uuid::new_v4()),
            kind: pick(&mut self.rng, ABILITY_TYPES),
            description: format!("Test Ability Description {}", Uuid::new_v4()),
            danger_level: self.rng.gen_range(DANGER_LEVELS),
            range: pick(&mut self.rng, ABILITY_RANGES),
            activation: pick(&mut self.rng, ABILITY_ACTIVATIONS),
        }
    }

    /// Admin credentials from the run configuration.
    pub fn admin_credentials(config: &TestConfig) -> LoginCredentials {
        LoginCredentials {
            username: config.admin_username.clone(),
            password: config.admin_password.clone(),
        }
    }

    /// Credentials that no server should accept.
    pub fn bogus_credentials(&mut self) -> LoginCredentials {
        LoginCredentials {
            username: format!("invalid_user_{}", Uuid::new_v4().simple()),
            password: format!("wrong_password_{}", self.rng.gen_range(100..1000)),
        }
    }

    /// Sequential detective ids `"1"..="count"`.
    pub fn detective_ids(count: usize) -> Vec<String> {
        (1..=count).map(|i| i.to_string()).collect()
    }
}

fn pick(rng: &mut StdRng, set: &[&str]) -> String {
    set.choose(rng).copied().unwrap_or_default().to_string()
}

fn today() -> String {
    OffsetDateTime::now_utc()
        .format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_default()
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z"))
        .unwrap_or_default()
}
