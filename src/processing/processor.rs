use crate::error::{AppError, Result};
use crate::models::{Incident, IncidentUpdate, NewIncident};
use crate::processing::HumanIdGenerator;
use crate::search::{IncidentFilter, Pagination};
use crate::state::IncidentStore;
use chrono::Local;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// One page of incidents
#[derive(Debug, Clone, Serialize)]
pub struct IncidentPage {
    pub incidents: Vec<Incident>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

/// Main incident processor
pub struct IncidentProcessor {
    store: Arc<dyn IncidentStore>,
    human_ids: HumanIdGenerator,
}

impl IncidentProcessor {
    pub fn new(store: Arc<dyn IncidentStore>) -> Self {
        Self {
            human_ids: HumanIdGenerator::new(store.clone()),
            store,
        }
    }

    /// Create an incident on behalf of `created_by`
    pub async fn create_incident(&self, draft: NewIncident, created_by: Uuid) -> Result<Incident> {
        draft.validate()?;

        // Validate the trimmed record before a sequence number is taken
        let mut incident = Incident::new(draft, String::new(), created_by);
        incident.validate()?;

        incident.human_id = self.human_ids.next_human_id(Local::now()).await?;
        self.store.insert_incident(&incident).await?;

        tracing::info!(
            incident_id = %incident.id,
            human_id = %incident.human_id,
            severity = %incident.severity,
            environment = %incident.environment,
            created_by = %created_by,
            "Incident created"
        );

        Ok(incident)
    }

    /// Get an incident by ID
    pub async fn get_incident(&self, id: &Uuid) -> Result<Incident> {
        self.store
            .get_incident(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Incident not found.".to_string()))
    }

    /// All incidents, newest first
    pub async fn list_incidents(&self, pagination: Pagination) -> Result<IncidentPage> {
        self.page(&IncidentFilter::all(), pagination).await
    }

    /// Incidents matching the given query parameters
    pub async fn search_incidents(
        &self,
        params: &HashMap<String, String>,
        pagination: Pagination,
    ) -> Result<IncidentPage> {
        let filter = IncidentFilter::from_params(params);

        tracing::debug!(
            conditions = filter.conditions().len(),
            page = pagination.page,
            limit = pagination.limit,
            "Searching incidents"
        );

        self.page(&filter, pagination).await
    }

    async fn page(&self, filter: &IncidentFilter, pagination: Pagination) -> Result<IncidentPage> {
        let incidents = self
            .store
            .find_incidents(filter, pagination.skip, pagination.limit)
            .await?;
        let total = self.store.count_incidents(filter).await?;

        Ok(IncidentPage {
            incidents,
            total,
            page: pagination.page,
            limit: pagination.limit,
        })
    }

    /// Apply a partial update
    pub async fn update_incident(
        &self,
        id: &Uuid,
        update: IncidentUpdate,
        actor: Uuid,
    ) -> Result<Incident> {
        update.validate()?;

        let mut previous_status = None;
        let incident = self
            .store
            .modify_incident(id, &mut |incident| {
                previous_status = Some(incident.status);
                incident.apply_update(update.clone(), actor);
                incident.validate()?;
                Ok(())
            })
            .await?;

        if let Some(from) = previous_status.filter(|from| *from != incident.status) {
            tracing::info!(
                incident_id = %id,
                from = %from,
                to = %incident.status,
                "Incident status changed"
            );
        }
        tracing::info!(incident_id = %id, updated_by = %actor, "Incident updated");

        Ok(incident)
    }

    /// Hard delete, returning the removed incident
    pub async fn delete_incident(&self, id: &Uuid) -> Result<Incident> {
        let incident = self
            .store
            .delete_incident(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Incident not found.".to_string()))?;

        tracing::info!(
            incident_id = %id,
            human_id = %incident.human_id,
            "Incident deleted"
        );

        Ok(incident)
    }

    /// Append to the case discussion, returning the updated incident
    pub async fn add_discussion(
        &self,
        id: &Uuid,
        message: &str,
        author_id: Uuid,
    ) -> Result<Incident> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AppError::Validation("Message is required.".to_string()));
        }

        let incident = self
            .store
            .modify_incident(id, &mut |incident| {
                incident.add_discussion(message.to_string(), author_id);
                Ok(())
            })
            .await?;

        tracing::info!(
            incident_id = %id,
            author_id = %author_id,
            entries = incident.case_discussion.len(),
            "Discussion entry added"
        );

        Ok(incident)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Environment, IncidentStatus, Severity};
    use crate::state::InMemoryStore;

    fn processor() -> IncidentProcessor {
        IncidentProcessor::new(Arc::new(InMemoryStore::new()))
    }

    fn draft(title: &str, severity: Severity) -> NewIncident {
        NewIncident {
            title: title.to_string(),
            description: "Replica lag growing on primary cluster".to_string(),
            environment: Environment::Production,
            severity: Some(severity),
            status: None,
            assigned_to: None,
            tags: vec!["database".to_string()],
            resolution_details: None,
            related_links: vec![],
            related_incidents: vec![],
        }
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_human_ids() {
        let processor = processor();
        let author = Uuid::new_v4();

        let first = processor
            .create_incident(draft("First", Severity::High), author)
            .await
            .unwrap();
        let second = processor
            .create_incident(draft("Second", Severity::Low), author)
            .await
            .unwrap();

        assert!(first.human_id.ends_with("-INC001"));
        assert!(second.human_id.ends_with("-INC002"));
        assert_eq!(first.created_by, author);
        assert_eq!(first.status, IncidentStatus::Open);
    }

    #[tokio::test]
    async fn test_blank_title_rejected_without_taking_a_sequence() {
        let processor = processor();
        let err = processor
            .create_incident(draft("   ", Severity::Low), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let created = processor
            .create_incident(draft("Real outage", Severity::Low), Uuid::new_v4())
            .await
            .unwrap();
        assert!(created.human_id.ends_with("-INC001"));
    }

    #[tokio::test]
    async fn test_get_missing_incident() {
        let err = processor().get_incident(&Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_sets_resolution_fields() {
        let processor = processor();
        let created = processor
            .create_incident(draft("Outage", Severity::Critical), Uuid::new_v4())
            .await
            .unwrap();

        let responder = Uuid::new_v4();
        let updated = processor
            .update_incident(
                &created.id,
                IncidentUpdate {
                    status: Some(IncidentStatus::Resolved),
                    resolution_details: Some("Failed over to replica".to_string()),
                    ..Default::default()
                },
                responder,
            )
            .await
            .unwrap();

        assert_eq!(updated.status, IncidentStatus::Resolved);
        assert!(updated.resolved_at.is_some());
        assert_eq!(updated.updated_by, Some(responder));
        assert_eq!(updated.human_id, created.human_id);
    }

    #[tokio::test]
    async fn test_search_and_pagination() {
        let processor = processor();
        let author = Uuid::new_v4();
        for i in 0..5 {
            processor
                .create_incident(draft(&format!("Database issue {i}"), Severity::Medium), author)
                .await
                .unwrap();
        }
        processor
            .create_incident(draft("Network flap", Severity::Critical), author)
            .await
            .unwrap();

        let mut params = HashMap::new();
        params.insert("title".to_string(), "DATABASE".to_string());

        let page = processor
            .search_incidents(&params, Pagination::new(2, 2))
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.incidents.len(), 2);
        assert_eq!(page.page, 2);

        params.clear();
        params.insert("search".to_string(), "critical".to_string());
        let page = processor
            .search_incidents(&params, Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.incidents[0].title, "Network flap");
    }

    #[tokio::test]
    async fn test_discussion_appends_in_order() {
        let processor = processor();
        let created = processor
            .create_incident(draft("Outage", Severity::High), Uuid::new_v4())
            .await
            .unwrap();
        let author = Uuid::new_v4();

        processor.add_discussion(&created.id, "Paging on-call", author).await.unwrap();
        processor.add_discussion(&created.id, "Rolled back", author).await.unwrap();

        let stored = processor.get_incident(&created.id).await.unwrap();
        let messages: Vec<_> = stored
            .case_discussion
            .iter()
            .map(|entry| entry.message.as_str())
            .collect();
        assert_eq!(messages, vec!["Paging on-call", "Rolled back"]);
        assert_eq!(stored.case_discussion[0].author_id, author);

        let err = processor
            .add_discussion(&created.id, "  ", author)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_discussion_appends_are_all_kept() {
        let processor = Arc::new(processor());
        let created = processor
            .create_incident(draft("Outage", Severity::High), Uuid::new_v4())
            .await
            .unwrap();

        let handles: Vec<_> = (0..200)
            .map(|i| {
                let processor = processor.clone();
                let id = created.id;
                tokio::spawn(async move {
                    processor
                        .add_discussion(&id, &format!("update {i}"), Uuid::new_v4())
                        .await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = processor.get_incident(&created.id).await.unwrap();
        assert_eq!(stored.case_discussion.len(), 200);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_update_does_not_drop_concurrent_discussion() {
        let processor = Arc::new(processor());
        let created = processor
            .create_incident(draft("Outage", Severity::High), Uuid::new_v4())
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..50 {
            let processor = processor.clone();
            let id = created.id;
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    processor
                        .add_discussion(&id, "still investigating", Uuid::new_v4())
                        .await
                        .map(|_| ())
                } else {
                    processor
                        .update_incident(
                            &id,
                            IncidentUpdate {
                                status: Some(IncidentStatus::InProgress),
                                ..Default::default()
                            },
                            Uuid::new_v4(),
                        )
                        .await
                        .map(|_| ())
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = processor.get_incident(&created.id).await.unwrap();
        assert_eq!(stored.case_discussion.len(), 25);
        assert_eq!(stored.status, IncidentStatus::InProgress);
    }

    #[tokio::test]
    async fn test_invalid_update_is_not_stored() {
        let processor = processor();
        let created = processor
            .create_incident(draft("Outage", Severity::High), Uuid::new_v4())
            .await
            .unwrap();

        let err = processor
            .update_incident(
                &created.id,
                IncidentUpdate {
                    title: Some("   ".to_string()),
                    ..Default::default()
                },
                Uuid::new_v4(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let stored = processor.get_incident(&created.id).await.unwrap();
        assert_eq!(stored.title, "Outage");
        assert!(stored.updated_by.is_none());
    }

    #[tokio::test]
    async fn test_delete_returns_record() {
        let processor = processor();
        let created = processor
            .create_incident(draft("Outage", Severity::High), Uuid::new_v4())
            .await
            .unwrap();

        let deleted = processor.delete_incident(&created.id).await.unwrap();
        assert_eq!(deleted.id, created.id);
        assert!(matches!(
            processor.delete_incident(&created.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
