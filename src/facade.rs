//! Single entry point for application code.
//!
//! Holds one [`AsyncMailDispatcher`] and one [`NotificationRouter`] built over
//! shared transports and exposes the five public operations. The two halves
//! stay independent; the facade only forwards.

use std::sync::Arc;

use crate::config::Settings;
use crate::error::Result;
use crate::mail::{
    create_mail_transport, AsyncMailDispatcher, DeliveryHandle, MailTransport, MailWorkerPool,
};
use crate::router::{
    create_broadcast_transport, AddressScheme, BroadcastTransport, NotificationRouter,
};

pub struct NotificationFacade {
    mail: Arc<AsyncMailDispatcher>,
    router: Arc<NotificationRouter>,
}

impl NotificationFacade {
    pub fn new(mail: Arc<AsyncMailDispatcher>, router: Arc<NotificationRouter>) -> Self {
        Self { mail, router }
    }

    /// Build both components from settings using the configured transports.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        settings.validate()?;
        let mail_transport = create_mail_transport(&settings.mail);
        let broadcast_transport = create_broadcast_transport(settings)?;
        Self::with_transports(settings, mail_transport, broadcast_transport)
    }

    /// Build both components from settings around caller-supplied transports.
    pub fn with_transports(
        settings: &Settings,
        mail_transport: Arc<dyn MailTransport>,
        broadcast_transport: Arc<dyn BroadcastTransport>,
    ) -> Result<Self> {
        let pool = Arc::new(MailWorkerPool::new(settings.mail.pool.clone())?);
        let mail = Arc::new(AsyncMailDispatcher::new(mail_transport, pool));
        let router = Arc::new(NotificationRouter::new(
            broadcast_transport,
            AddressScheme::from(&settings.router),
        ));

        tracing::info!(
            max_concurrency = settings.mail.pool.max_concurrency,
            admission = settings.mail.pool.admission.as_str(),
            "Notification facade ready"
        );

        Ok(Self::new(mail, router))
    }

    pub fn mail(&self) -> &Arc<AsyncMailDispatcher> {
        &self.mail
    }

    pub fn router(&self) -> &Arc<NotificationRouter> {
        &self.router
    }

    pub async fn send(
        &self,
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> DeliveryHandle {
        self.mail.send(recipient, subject, body).await
    }

    pub async fn send_html(
        &self,
        recipient: impl Into<String>,
        subject: impl Into<String>,
        html_body: impl Into<String>,
    ) -> DeliveryHandle {
        self.mail.send_html(recipient, subject, html_body).await
    }

    pub async fn send_notification(&self, user_id: Option<i64>, payload: serde_json::Value) {
        self.router.send_notification(user_id, payload).await
    }

    pub async fn broadcast_data_update(&self, entity: &str, id: Option<i64>, action: &str) {
        self.router.broadcast_data_update(entity, id, action).await
    }

    pub async fn broadcast_to_role(&self, role: Option<&str>, payload: serde_json::Value) {
        self.router.broadcast_to_role(role, payload).await
    }

    /// Stop accepting mail and wait for admitted deliveries to resolve.
    pub async fn shutdown(&self) {
        self.mail.pool().shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_default_settings() {
        let facade = NotificationFacade::from_settings(&Settings::default()).unwrap();

        assert!(facade.send("a@example.com", "s", "b").await.await.success);
        facade.broadcast_data_update("Order", None, "CREATED").await;
        assert_eq!(facade.router().stats().pushed, 1);

        facade.shutdown().await;
        assert!(!facade.send("a@example.com", "s", "b").await.await.success);
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let mut settings = Settings::default();
        settings.mail.pool.max_concurrency = 0;
        assert!(NotificationFacade::from_settings(&settings).is_err());
    }
}
