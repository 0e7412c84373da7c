//! Lifecycle events and the listeners that react to them.
//!
//! Maintenance windows go through the same registry so that their phases
//! reach users and subscribers like any other event.
//!
//! Transitions commit their status change and history entry first, then hand
//! a [`LifecycleEvent`] to the [`ListenerRegistry`]. Listeners (notifications,
//! webhooks) are registered explicitly at startup. A failing listener never
//! undoes the transition; its error comes back in the [`DispatchReport`].

use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::models::{
    LicenseRequest, RequestStatus, SystemMaintenance, Title, TitleStatus, User, WebhookEvent,
};

/// Something that happened to a title, a request or a user.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    TitleCreated {
        title: Title,
        actor: Option<Uuid>,
    },
    TitleUpdated {
        title: Title,
        /// Set when the update moved the status.
        previous_status: Option<TitleStatus>,
        actor: Option<Uuid>,
    },
    TitleExpired {
        title: Title,
        previous_status: TitleStatus,
    },
    RequestCreated {
        request: LicenseRequest,
    },
    RequestUpdated {
        request: LicenseRequest,
        actor: Option<Uuid>,
    },
    RequestStatusChanged {
        request: LicenseRequest,
        previous_status: RequestStatus,
        actor: Option<Uuid>,
    },
    RequestAssigned {
        request: LicenseRequest,
        previous_assignee: Option<Uuid>,
        actor: Option<Uuid>,
    },
    UserCreated {
        user: User,
    },
    /// A maintenance window was scheduled, started, completed or cancelled;
    /// the window's status says which.
    Maintenance {
        maintenance: SystemMaintenance,
        actor: Option<Uuid>,
    },
}

impl LifecycleEvent {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::TitleCreated { .. } => "title_created",
            LifecycleEvent::TitleUpdated { .. } => "title_updated",
            LifecycleEvent::TitleExpired { .. } => "title_expired",
            LifecycleEvent::RequestCreated { .. } => "request_created",
            LifecycleEvent::RequestUpdated { .. } => "request_updated",
            LifecycleEvent::RequestStatusChanged { .. } => "request_status_changed",
            LifecycleEvent::RequestAssigned { .. } => "request_assigned",
            LifecycleEvent::UserCreated { .. } => "user_created",
            LifecycleEvent::Maintenance { .. } => "maintenance",
        }
    }

    /// Webhook event this lifecycle event is published as.
    pub fn webhook_event(&self) -> WebhookEvent {
        match self {
            LifecycleEvent::TitleCreated { .. } => WebhookEvent::TitleCreated,
            LifecycleEvent::TitleUpdated { .. } => WebhookEvent::TitleUpdated,
            LifecycleEvent::TitleExpired { .. } => WebhookEvent::TitleExpired,
            LifecycleEvent::RequestCreated { .. } => WebhookEvent::RequestCreated,
            LifecycleEvent::RequestStatusChanged { request, .. } => match request.status {
                RequestStatus::Approved => WebhookEvent::RequestApproved,
                RequestStatus::Rejected => WebhookEvent::RequestRejected,
                _ => WebhookEvent::RequestUpdated,
            },
            LifecycleEvent::RequestUpdated { .. } | LifecycleEvent::RequestAssigned { .. } => {
                WebhookEvent::RequestUpdated
            }
            LifecycleEvent::UserCreated { .. } => WebhookEvent::UserCreated,
            LifecycleEvent::Maintenance { .. } => WebhookEvent::SystemMaintenance,
        }
    }

    /// The `data` object of the webhook envelope.
    pub fn payload(&self) -> JsonValue {
        match self {
            LifecycleEvent::TitleCreated { title, .. } => title_payload(title),
            LifecycleEvent::TitleUpdated {
                title,
                previous_status,
                ..
            } => {
                let mut data = title_payload(title);
                if let Some(previous) = previous_status {
                    data["previous_status"] = json!(previous.as_str());
                }
                data
            }
            LifecycleEvent::TitleExpired {
                title,
                previous_status,
            } => {
                let mut data = title_payload(title);
                data["previous_status"] = json!(previous_status.as_str());
                data
            }
            LifecycleEvent::RequestCreated { request }
            | LifecycleEvent::RequestUpdated { request, .. } => request_payload(request),
            LifecycleEvent::RequestStatusChanged {
                request,
                previous_status,
                ..
            } => {
                let mut data = request_payload(request);
                data["previous_status"] = json!(previous_status.as_str());
                data
            }
            LifecycleEvent::RequestAssigned {
                request,
                previous_assignee,
                ..
            } => {
                let mut data = request_payload(request);
                data["previous_assignee_id"] = json!(previous_assignee);
                data
            }
            LifecycleEvent::UserCreated { user } => json!({
                "id": user.id,
                "email": user.email,
                "full_name": user.full_name,
                "role": user.role.as_str(),
            }),
            LifecycleEvent::Maintenance { maintenance, .. } => json!({
                "id": maintenance.id,
                "phase": maintenance.status.phase(),
                "title": maintenance.title,
                "description": maintenance.description,
                "status": maintenance.status.as_str(),
                "priority": maintenance.priority.as_str(),
                "scheduled_start": maintenance.scheduled_start,
                "scheduled_end": maintenance.scheduled_end,
                "actual_start": maintenance.actual_start,
                "actual_end": maintenance.actual_end,
                "impact_description": maintenance.impact_description,
            }),
        }
    }
}

fn title_payload(title: &Title) -> JsonValue {
    json!({
        "id": title.id,
        "number": title.number,
        "title_type": title.title_type.as_str(),
        "owner_id": title.owner_id,
        "status": title.status.as_str(),
        "issue_date": title.issue_date,
        "expiration_date": title.expiration_date,
        "annual_fee": title.annual_fee,
    })
}

fn request_payload(request: &LicenseRequest) -> JsonValue {
    json!({
        "id": request.id,
        "file_number": request.file_number,
        "company": request.company,
        "title_type": request.title_type.as_str(),
        "requester_id": request.requester_id,
        "assignee_id": request.assignee_id,
        "status": request.status.as_str(),
        "submission_date": request.submission_date,
        "processing_date": request.processing_date,
    })
}

/// Error reported by a listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("Listener storage error: {0}")]
    Storage(String),

    #[error("Listener delivery error: {0}")]
    Delivery(String),
}

/// Reacts to lifecycle events after the transition is committed.
#[async_trait::async_trait]
pub trait LifecycleListener: Send + Sync {
    fn name(&self) -> &'static str;

    async fn on_event(&self, event: &LifecycleEvent) -> Result<(), ListenerError>;
}

/// Outcome of dispatching one event to every listener.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub event: &'static str,
    pub succeeded: usize,
    pub failures: Vec<(&'static str, ListenerError)>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Whether the listener called `name` reported an error.
    pub fn failed(&self, name: &str) -> bool {
        self.failures.iter().any(|(listener, _)| *listener == name)
    }

    /// Logs each listener failure as a warning.
    pub fn log_failures(&self) {
        for (listener, error) in &self.failures {
            warn!(
                event = self.event,
                listener = *listener,
                error = %error,
                "Lifecycle listener failed"
            );
        }
    }
}

/// Listeners wired at startup.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    listeners: Vec<Arc<dyn LifecycleListener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: Arc<dyn LifecycleListener>) {
        self.listeners.push(listener);
    }

    pub fn with(mut self, listener: Arc<dyn LifecycleListener>) -> Self {
        self.register(listener);
        self
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Hands `event` to every listener in registration order.
    pub async fn dispatch(&self, event: &LifecycleEvent) -> DispatchReport {
        let mut report = DispatchReport {
            event: event.name(),
            ..Default::default()
        };
        for listener in &self.listeners {
            match listener.on_event(event).await {
                Ok(()) => report.succeeded += 1,
                Err(e) => report.failures.push((listener.name(), e)),
            }
        }
        report
    }

    /// Dispatches and logs failures; for callers that only need the side effects.
    pub async fn publish(&self, event: LifecycleEvent) {
        self.dispatch(&event).await.log_failures();
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.listeners.iter().map(|l| l.name()).collect();
        f.debug_struct("ListenerRegistry").field("listeners", &names).finish()
    }
}
