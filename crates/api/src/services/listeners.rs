//! Lifecycle listeners wired at startup: notifications and webhooks.

use async_trait::async_trait;
use domain::models::{MaintenanceStatus, NewNotification};
use domain::services::notification as compose;
use domain::services::{LifecycleEvent, LifecycleListener, ListenerError};
use persistence::repositories::UserRepository;
use tracing::debug;

use super::notifications::NotificationDispatcher;
use super::webhook_delivery::WebhookDeliveryService;

/// Turns lifecycle events into user notifications.
pub struct NotificationListener {
    dispatcher: NotificationDispatcher,
    users: UserRepository,
}

impl NotificationListener {
    pub fn new(dispatcher: NotificationDispatcher, users: UserRepository) -> Self {
        Self { dispatcher, users }
    }

    async fn notifications_for(
        &self,
        event: &LifecycleEvent,
    ) -> Result<Vec<NewNotification>, ListenerError> {
        let batch = match event {
            LifecycleEvent::TitleCreated { title, .. } => vec![compose::title_created(title)],
            LifecycleEvent::TitleUpdated {
                title,
                previous_status,
                ..
            } => vec![compose::title_updated(title, *previous_status)],
            LifecycleEvent::TitleExpired { title, .. } => vec![compose::title_expired(title)],
            LifecycleEvent::RequestCreated { request } => {
                let staff = self
                    .users
                    .list_active_staff()
                    .await
                    .map_err(|e| ListenerError::Storage(e.to_string()))?;
                std::iter::once(compose::request_submitted(request))
                    .chain(
                        staff
                            .iter()
                            .filter(|s| s.id != request.requester_id)
                            .map(|s| compose::request_submitted_for_staff(request, s.id)),
                    )
                    .collect()
            }
            LifecycleEvent::RequestUpdated { request, .. } => {
                vec![compose::request_updated(request)]
            }
            LifecycleEvent::RequestStatusChanged {
                request,
                previous_status,
                ..
            } => vec![compose::request_status_changed(request, *previous_status)],
            LifecycleEvent::RequestAssigned { request, .. } => request
                .assignee_id
                .map(|assignee| compose::request_assigned(request, assignee))
                .into_iter()
                .collect(),
            LifecycleEvent::Maintenance { maintenance, .. }
                if maintenance.status == MaintenanceStatus::InProgress
                    && !maintenance.notification_sent =>
            {
                let users = self
                    .users
                    .list_active()
                    .await
                    .map_err(|e| ListenerError::Storage(e.to_string()))?;
                users
                    .iter()
                    .map(|u| compose::maintenance_started(maintenance, u.id))
                    .collect()
            }
            LifecycleEvent::UserCreated { .. } | LifecycleEvent::Maintenance { .. } => Vec::new(),
        };
        Ok(batch)
    }
}

#[async_trait]
impl LifecycleListener for NotificationListener {
    fn name(&self) -> &'static str {
        "notifications"
    }

    async fn on_event(&self, event: &LifecycleEvent) -> Result<(), ListenerError> {
        let batch = self.notifications_for(event).await?;
        let expected = batch.len();
        let created = self.dispatcher.create_many(batch).await;
        debug!(event = event.name(), created, expected, "Notifications created");

        if created < expected {
            return Err(ListenerError::Storage(format!(
                "{} of {} notifications could not be stored",
                expected - created,
                expected
            )));
        }
        Ok(())
    }
}

/// Publishes lifecycle events to subscribed webhooks.
pub struct WebhookListener {
    deliveries: WebhookDeliveryService,
}

impl WebhookListener {
    pub fn new(deliveries: WebhookDeliveryService) -> Self {
        Self { deliveries }
    }
}

#[async_trait]
impl LifecycleListener for WebhookListener {
    fn name(&self) -> &'static str {
        "webhooks"
    }

    async fn on_event(&self, event: &LifecycleEvent) -> Result<(), ListenerError> {
        self.deliveries
            .send_webhook(event.webhook_event().as_str(), event.payload(), None)
            .await
            .map(|_| ())
            .map_err(|e| ListenerError::Delivery(e.to_string()))
    }
}
