use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::snapshot::StatusChange;

pub type Extra = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentGroup {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub services: Vec<EquipmentService>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentService {
    pub id: String,
    #[serde(default)]
    pub enclave: String,
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub status_color: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub history: Vec<StatusHistoryEntry>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryEntry {
    pub status: String,
    pub notes: String,
    pub timestamp: DateTime<Utc>,
}

impl EquipmentGroup {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            services: Vec::new(),
            extra: Extra::new(),
        }
    }

    pub fn owns_service(&self, service_id: &str) -> bool {
        self.services.iter().any(|s| s.id == service_id)
    }

    pub fn service_mut(&mut self, service_id: &str) -> Option<&mut EquipmentService> {
        self.services.iter_mut().find(|s| s.id == service_id)
    }
}

impl EquipmentService {
    pub fn new(
        id: impl Into<String>,
        enclave: impl Into<String>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            enclave: enclave.into(),
            service_name: service_name.into(),
            status: "Offline".to_string(),
            status_color: "default".to_string(),
            notes: String::new(),
            last_updated: None,
            history: Vec::new(),
            extra: Extra::new(),
        }
    }

    pub fn apply_transition(&mut self, change: &StatusChange) -> String {
        let previous = std::mem::replace(&mut self.status, change.current.label().to_string());
        self.history.push(StatusHistoryEntry {
            status: previous.clone(),
            notes: self.notes.clone(),
            timestamp: change.at,
        });
        self.status_color = change.color.as_str().to_string();
        self.last_updated = Some(change.at);
        previous
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLogEntry {
    pub id: String,
    pub level: String,
    pub category: String,
    pub title: String,
    pub message: String,
    pub author: String,
    pub is_user_generated: bool,
    pub timestamp: DateTime<Utc>,
}

impl EventLogEntry {
    pub fn status_transition(
        group: &EquipmentGroup,
        service: &EquipmentService,
        previous_status: &str,
        change: &StatusChange,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            level: "Alert".to_string(),
            category: format!("{} {} {}", group.name, service.enclave, service.service_name),
            title: format!("Status updated to **{}**.", change.current),
            message: format!("Previous status: {previous_status}. Updated from continuous polling."),
            author: "System".to_string(),
            is_user_generated: false,
            timestamp: change.at,
        }
    }
}
