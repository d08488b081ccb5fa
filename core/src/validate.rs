//! Domain-invariant checks for decoded entities.
//!
//! Validation is a pure read of the entity: it collects every broken rule
//! into a `Verdict` instead of stopping at the first one, so a report shows
//! the whole picture.

use std::fmt;
use std::ops::RangeInclusive;

use rust_decimal::Decimal;

use crate::types::{
    Ability, AuthResponse, Case, Detective, ABILITY_TYPES, CASE_PRIORITIES, CASE_STATUSES,
    DANGER_LEVELS, DETECTIVE_AGES, DETECTIVE_STATUSES,
};

/// Which invariant a field broke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    NonEmpty,
    OneOf(&'static [&'static str]),
    InRange(i64, i64),
    NonNegative,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: &'static str,
    pub rule: Rule,
    /// The offending value as seen on the entity.
    pub actual: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rule {
            Rule::NonEmpty => write!(f, "`{}` must not be empty", self.field),
            Rule::OneOf(set) => write!(f, "`{}` must be one of {:?}, got {:?}", self.field, set, self.actual),
            Rule::InRange(lo, hi) => write!(f, "`{}` must be in [{lo}, {hi}], got {}", self.field, self.actual),
            Rule::NonNegative => write!(f, "`{}` must not be negative, got {}", self.field, self.actual),
        }
    }
}

/// Outcome of validating one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verdict {
    pub violations: Vec<Violation>,
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// First broken invariant, if any.
    pub fn first(&self) -> Option<&Violation> {
        self.violations.first()
    }

    fn non_empty(&mut self, field: &'static str, value: &str) {
        if value.trim().is_empty() {
            self.violations.push(Violation {
                field,
                rule: Rule::NonEmpty,
                actual: value.to_string(),
            });
        }
    }

    fn one_of(&mut self, field: &'static str, value: &str, set: &'static [&'static str]) {
        if !set.contains(&value) {
            self.violations.push(Violation {
                field,
                rule: Rule::OneOf(set),
                actual: value.to_string(),
            });
        }
    }

    fn in_range(&mut self, field: &'static str, value: i32, range: RangeInclusive<i32>) {
        if !range.contains(&value) {
            self.violations.push(Violation {
                field,
                rule: Rule::InRange(i64::from(*range.start()), i64::from(*range.end())),
                actual: value.to_string(),
            });
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            return f.write_str("valid");
        }
        let parts: Vec<String> = self.violations.iter().map(|v| v.to_string()).collect();
        f.write_str(&parts.join("; "))
    }
}

pub trait Validate {
    /// Field invariants, without the server-assigned id.
    fn validate_fields(&self) -> Verdict;

    fn id_value(&self) -> &str;

    /// Full check of a persisted entity: non-empty id plus field invariants.
    fn validate(&self) -> Verdict {
        let mut verdict = Verdict::default();
        verdict.non_empty("id", self.id_value());
        verdict.violations.extend(self.validate_fields().violations);
        verdict
    }
}

impl Validate for Detective {
    fn validate_fields(&self) -> Verdict {
        let mut v = Verdict::default();
        v.non_empty("name", &self.name);
        v.one_of("status", &self.status, DETECTIVE_STATUSES);
        v.in_range("age", self.age, DETECTIVE_AGES);
        v.non_empty("joinedAt", &self.joined_at);
        v
    }

    fn id_value(&self) -> &str {
        &self.id
    }
}

impl Validate for Case {
    fn validate_fields(&self) -> Verdict {
        let mut v = Verdict::default();
        v.non_empty("title", &self.title);
        v.one_of("status", &self.status, CASE_STATUSES);
        v.one_of("priority", &self.priority, CASE_PRIORITIES);
        v.non_empty("createdAt", &self.created_at);
        if let Some(reward) = self.reward {
            if reward < Decimal::ZERO {
                v.violations.push(Violation {
                    field: "reward",
                    rule: Rule::NonNegative,
                    actual: reward.to_string(),
                });
            }
        }
        v
    }

    fn id_value(&self) -> &str {
        &self.id
    }
}

impl Validate for Ability {
    fn validate_fields(&self) -> Verdict {
        let mut v = Verdict::default();
        v.non_empty("name", &self.name);
        v.one_of("type", &self.kind, ABILITY_TYPES);
        v.in_range("dangerLevel", self.danger_level, DANGER_LEVELS);
        v
    }

    fn id_value(&self) -> &str {
        &self.id
    }
}

impl Validate for AuthResponse {
    fn validate_fields(&self) -> Verdict {
        let mut v = Verdict::default();
        v.non_empty("message", &self.message);
        v.non_empty("user.username", &self.user.username);
        v.non_empty("user.role", &self.user.role);
        v
    }

    fn id_value(&self) -> &str {
        &self.user.id
    }
}
