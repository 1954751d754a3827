//! Incident filter construction and matching
//!
//! An [`IncidentFilter`] is a conjunction of [`Condition`]s. It is built from
//! untrusted query parameters with [`IncidentFilter::from_params`], which never
//! fails: anything it cannot make sense of simply adds no constraint. Stores
//! evaluate the filter with [`IncidentFilter::matches`].

use crate::models::Incident;
use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};

/// Incident fields a condition can address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    HumanId,
    Title,
    Description,
    Status,
    Environment,
    Severity,
    Tags,
}

impl Field {
    /// Fields covered by the free-text `search` parameter
    pub const SEARCHABLE: [Field; 5] = [
        Field::Title,
        Field::Description,
        Field::Tags,
        Field::Severity,
        Field::Environment,
    ];

    fn values<'a>(&self, incident: &'a Incident) -> Vec<Cow<'a, str>> {
        match self {
            Field::HumanId => vec![Cow::Borrowed(incident.human_id.as_str())],
            Field::Title => vec![Cow::Borrowed(incident.title.as_str())],
            Field::Description => vec![Cow::Borrowed(incident.description.as_str())],
            Field::Status => vec![Cow::Borrowed(incident.status.as_ref())],
            Field::Environment => vec![Cow::Borrowed(incident.environment.as_ref())],
            Field::Severity => vec![Cow::Borrowed(incident.severity.as_ref())],
            Field::Tags => incident.tags.iter().map(|t| Cow::Borrowed(t.as_str())).collect(),
        }
    }
}

/// A single match constraint
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Case-insensitive substring; `needle` is stored lowercased
    Contains { field: Field, needle: String },
    /// Exact match against the field's canonical string form
    Equals { field: Field, value: String },
    /// Case-sensitive prefix
    StartsWith { field: Field, prefix: String },
    /// At least one tag in common
    AnyTag(BTreeSet<String>),
    /// Logical OR of the nested conditions
    AnyOf(Vec<Condition>),
}

impl Condition {
    pub fn contains(field: Field, term: &str) -> Self {
        Condition::Contains {
            field,
            needle: term.to_lowercase(),
        }
    }

    pub fn matches(&self, incident: &Incident) -> bool {
        match self {
            Condition::Contains { field, needle } => field
                .values(incident)
                .iter()
                .any(|v| v.to_lowercase().contains(needle.as_str())),
            Condition::Equals { field, value } => {
                field.values(incident).iter().any(|v| v == value)
            }
            Condition::StartsWith { field, prefix } => field
                .values(incident)
                .iter()
                .any(|v| v.starts_with(prefix.as_str())),
            Condition::AnyTag(tags) => incident.tags.iter().any(|t| tags.contains(t)),
            Condition::AnyOf(conditions) => conditions.iter().any(|c| c.matches(incident)),
        }
    }

    fn constrains(&self, target: Field) -> bool {
        match self {
            Condition::Contains { field, .. }
            | Condition::Equals { field, .. }
            | Condition::StartsWith { field, .. } => *field == target,
            Condition::AnyTag(_) => target == Field::Tags,
            Condition::AnyOf(_) => false,
        }
    }
}

/// Conjunction of conditions; the empty filter matches everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncidentFilter {
    conditions: Vec<Condition>,
}

impl IncidentFilter {
    /// Filter that matches every incident
    pub fn all() -> Self {
        Self::default()
    }

    /// Incidents whose `humanId` starts with `prefix`
    pub fn human_id_prefix(prefix: impl Into<String>) -> Self {
        Self::all().and(Condition::StartsWith {
            field: Field::HumanId,
            prefix: prefix.into(),
        })
    }

    /// Build a filter from client-supplied search parameters.
    ///
    /// Recognised keys are `title`, `description`, `status`, `environment`,
    /// `tags`, `severity` and `search`; everything else is ignored. Empty
    /// values add no constraint.
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let mut filter = Self::all();

        let param = |key: &str| {
            params
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        if let Some(title) = param("title") {
            filter = filter.and(Condition::contains(Field::Title, title));
        }
        if let Some(description) = param("description") {
            filter = filter.and(Condition::contains(Field::Description, description));
        }

        for (key, field) in [
            ("status", Field::Status),
            ("environment", Field::Environment),
            ("severity", Field::Severity),
        ] {
            if let Some(value) = param(key) {
                filter = filter.and(Condition::Equals {
                    field,
                    value: value.to_string(),
                });
            }
        }

        if let Some(tags) = param("tags") {
            let set: BTreeSet<String> = tags
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
            if !set.is_empty() {
                filter = filter.and(Condition::AnyTag(set));
            }
        }

        if let Some(term) = param("search") {
            filter = filter.and(Condition::AnyOf(
                Field::SEARCHABLE
                    .iter()
                    .map(|field| Condition::contains(*field, term))
                    .collect(),
            ));
        }

        filter
    }

    /// Add a condition, AND-ed with the existing ones
    pub fn and(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Whether any top-level condition targets `field`
    pub fn constrains(&self, field: Field) -> bool {
        self.conditions.iter().any(|c| c.constrains(field))
    }

    pub fn matches(&self, incident: &Incident) -> bool {
        self.conditions.iter().all(|c| c.matches(incident))
    }
}
