use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;
use validator::Validate;

/// Represents an incident in the system
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    /// Opaque storage key
    pub id: Uuid,

    /// Date-scoped human-readable identifier (`MMDDYY-INCnnn`)
    pub human_id: String,

    /// Short summary
    #[validate(length(min = 1, max = 500))]
    pub title: String,

    /// Detailed description
    #[validate(length(min = 1, max = 1000))]
    pub description: String,

    /// Environment the incident occurred in
    pub environment: Environment,

    /// User who opened the incident
    pub created_by: Uuid,

    /// Current lifecycle status
    pub status: IncidentStatus,

    /// Assigned responder
    pub assigned_to: Option<Uuid>,

    /// Last user to update the incident
    pub updated_by: Option<Uuid>,

    /// Set when the incident first reaches Resolved or Closed
    pub resolved_at: Option<DateTime<Utc>>,

    /// Categorization tags
    #[validate(length(max = 10, message = "You can only add up to 10 tags."))]
    pub tags: Vec<String>,

    /// Free-form resolution notes
    #[validate(length(max = 1000))]
    pub resolution_details: String,

    /// Severity level
    pub severity: Severity,

    /// Reference links (runbooks, dashboards, tickets)
    pub related_links: Vec<String>,

    /// Related incidents
    pub related_incidents: Vec<Uuid>,

    /// Append-only case discussion
    pub case_discussion: Vec<DiscussionEntry>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Incident {
    /// Create a new incident from a creation payload
    pub fn new(draft: NewIncident, human_id: String, created_by: Uuid) -> Self {
        let now = Utc::now();
        let status = draft.status.unwrap_or_default();

        Self {
            id: Uuid::new_v4(),
            human_id,
            title: draft.title.trim().to_string(),
            description: draft.description.trim().to_string(),
            environment: draft.environment,
            created_by,
            resolved_at: status.is_terminal().then_some(now),
            status,
            assigned_to: draft.assigned_to,
            updated_by: None,
            tags: draft.tags,
            resolution_details: draft.resolution_details.unwrap_or_default(),
            severity: draft.severity.unwrap_or_default(),
            related_links: draft.related_links,
            related_incidents: draft.related_incidents,
            case_discussion: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update on behalf of `actor`
    pub fn apply_update(&mut self, update: IncidentUpdate, actor: Uuid) {
        let now = Utc::now();

        if let Some(title) = update.title {
            self.title = title.trim().to_string();
        }
        if let Some(description) = update.description {
            self.description = description.trim().to_string();
        }
        if let Some(environment) = update.environment {
            self.environment = environment;
        }
        if let Some(severity) = update.severity {
            self.severity = severity;
        }
        if let Some(status) = update.status {
            if status.is_terminal() && self.resolved_at.is_none() {
                self.resolved_at = Some(now);
            }
            self.status = status;
        }
        if let Some(assigned_to) = update.assigned_to {
            self.assigned_to = Some(assigned_to);
        }
        if let Some(tags) = update.tags {
            self.tags = tags;
        }
        if let Some(details) = update.resolution_details {
            self.resolution_details = details;
        }
        if let Some(links) = update.related_links {
            self.related_links = links;
        }
        if let Some(related) = update.related_incidents {
            self.related_incidents = related;
        }

        self.updated_by = Some(actor);
        self.updated_at = now;
    }

    /// Append a message to the case discussion
    pub fn add_discussion(&mut self, message: String, author_id: Uuid) -> &DiscussionEntry {
        let now = Utc::now();
        self.case_discussion.push(DiscussionEntry {
            message,
            author_id,
            timestamp: now,
        });
        self.updated_at = now;
        &self.case_discussion[self.case_discussion.len() - 1]
    }
}

#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display, AsRefStr,
)]
pub enum IncidentStatus {
    #[default]
    Open,
    #[serde(rename = "In Progress")]
    #[strum(serialize = "In Progress")]
    InProgress,
    Resolved,
    Closed,
}

impl IncidentStatus {
    /// Resolved and Closed incidents are finished
    pub fn is_terminal(&self) -> bool {
        matches!(self, IncidentStatus::Resolved | IncidentStatus::Closed)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumString,
    Display,
    AsRefStr,
)]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display, AsRefStr)]
pub enum Environment {
    Production,
    Staging,
    Development,
}

/// One entry of an incident's case discussion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiscussionEntry {
    pub message: String,
    pub author_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

/// Payload for creating an incident
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewIncident {
    #[validate(length(min = 1, max = 500, message = "Title is required."))]
    pub title: String,
    #[validate(length(min = 1, max = 1000, message = "Description is required."))]
    pub description: String,
    pub environment: Environment,
    pub severity: Option<Severity>,
    pub status: Option<IncidentStatus>,
    pub assigned_to: Option<Uuid>,
    #[serde(default)]
    #[validate(length(max = 10, message = "You can only add up to 10 tags."))]
    pub tags: Vec<String>,
    #[validate(length(max = 1000))]
    pub resolution_details: Option<String>,
    #[serde(default)]
    pub related_links: Vec<String>,
    #[serde(default)]
    pub related_incidents: Vec<Uuid>,
}

/// Partial update payload; `humanId` is deliberately absent
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct IncidentUpdate {
    #[validate(length(min = 1, max = 500))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 1000))]
    pub description: Option<String>,
    pub environment: Option<Environment>,
    pub status: Option<IncidentStatus>,
    pub severity: Option<Severity>,
    pub assigned_to: Option<Uuid>,
    #[validate(length(max = 10, message = "You can only add up to 10 tags."))]
    pub tags: Option<Vec<String>>,
    #[validate(length(max = 1000))]
    pub resolution_details: Option<String>,
    pub related_links: Option<Vec<String>>,
    pub related_incidents: Option<Vec<Uuid>>,
}
