//! Filter predicates shared by both adapters (spec.md §6:
//! "filters are AND-composed equality/in predicates over payload fields").

use serde_json::Value;

/// A single AND-composed predicate over a payload field.
#[derive(Debug, Clone)]
pub enum Predicate {
    Eq(String, Value),
    In(String, Vec<Value>),
}

/// A conjunction of predicates. Every `search`/`scroll`/`count` call on a
/// vector adapter, and every read path through the Query Engine, always
/// includes `project_id` and `deleted=false` (see [`Filter::scoped`]).
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub predicates: Vec<Predicate>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicates.push(Predicate::Eq(field.into(), value.into()));
        self
    }

    pub fn in_set(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.predicates.push(Predicate::In(field.into(), values));
        self
    }

    /// The filter every user-visible read applies: scoped to one project and
    /// excluding tombstones (spec.md invariant 2 and 5, §8).
    pub fn scoped(project_id: &str) -> Self {
        Self::new()
            .eq("project_id", project_id)
            .eq("deleted", false)
    }

    /// Whether a JSON payload (plus the well-known `project_id`/`deleted`
    /// fields merged in by the caller) satisfies every predicate. Used by
    /// the reference SQLite adapters' in-process filtering pass.
    pub fn matches(&self, fields: &serde_json::Map<String, Value>) -> bool {
        self.predicates.iter().all(|p| match p {
            Predicate::Eq(field, expected) => fields.get(field) == Some(expected),
            Predicate::In(field, expected) => fields
                .get(field)
                .map(|v| expected.contains(v))
                .unwrap_or(false),
        })
    }
}
