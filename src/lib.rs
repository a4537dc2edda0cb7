pub mod agent;
pub mod api;
pub mod core;
pub mod notify;
pub mod utils;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{dev::ServerHandle, web, App, HttpServer};
use parking_lot::Mutex;
use tracing::{error, info};

use crate::{
    agent::{
        client::{AcaPyClient, IdentityAgentClient},
        types::ProofRequestSpec,
    },
    core::{
        services::{PollScheduler, VerificationService, VerificationStateMachine},
        session::{SessionStore, VerifiedRegistry},
    },
    notify::{CommandChannelSink, NotificationSink, TracingSink},
    utils::{
        config::{Config, NotifierKind},
        error::{GateError, Result},
    },
};

pub struct Application {
    config: Arc<Config>,
    verification_service: Arc<VerificationService>,
    server: Mutex<Option<ServerHandle>>,
}

impl Application {
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);

        info!("Connecting to identity agent at {}", config.agent.admin_url);
        let agent = Arc::new(AcaPyClient::new(&config.agent)?);

        let sink: Arc<dyn NotificationSink> = match config.notifier.kind {
            NotifierKind::CommandChannel => {
                info!(
                    "Notifications via command channel {}:{}",
                    config.notifier.host, config.notifier.port
                );
                Arc::new(CommandChannelSink::new(
                    &config.notifier.host,
                    config.notifier.port,
                    config.get_notifier_timeout(),
                ))
            }
            NotifierKind::Log => {
                info!("Notifications written to log only");
                Arc::new(TracingSink)
            }
        };

        Ok(Self::with_components(config, agent, sink))
    }

    /// Wires the verification services around the given agent and sink.
    pub fn with_components(
        config: Arc<Config>,
        agent: Arc<dyn IdentityAgentClient>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let verification = &config.verification;
        let store = Arc::new(SessionStore::new());
        let registry = Arc::new(VerifiedRegistry::new());

        let machine = Arc::new(VerificationStateMachine::new(
            agent,
            store.clone(),
            registry.clone(),
            sink,
            ProofRequestSpec::from_config(verification),
            config.agent.alias_prefix.clone(),
        ));
        let scheduler = Arc::new(PollScheduler::new(
            machine.clone(),
            verification.get_poll_interval(),
            verification.get_grace_period(),
        ));
        let verification_service = Arc::new(VerificationService::new(
            store,
            registry,
            machine,
            scheduler,
            verification.get_session_timeout(),
            config.server.public_url.clone(),
        ));

        Self {
            config,
            verification_service,
            server: Mutex::new(None),
        }
    }

    pub fn verification_service(&self) -> Arc<VerificationService> {
        self.verification_service.clone()
    }

    pub async fn start(&self) -> Result<()> {
        info!("Starting API server...");
        self.start_api_server()?;

        info!("Application successfully started");
        Ok(())
    }

    fn start_api_server(&self) -> Result<()> {
        use crate::api::handlers;

        let verification_service = self.verification_service.clone();

        let server = HttpServer::new(move || {
            App::new()
                .wrap(Cors::permissive())
                .app_data(web::Data::new(verification_service.clone()))
                .service(handlers::verification::scope())
        })
        .bind((self.config.server.host.as_str(), self.config.server.port))
        .map_err(|e| GateError::Init(format!("Failed to bind API server: {}", e)))?
        .run();

        *self.server.lock() = Some(server.handle());
        tokio::spawn(async move {
            if let Err(e) = server.await {
                error!("API server stopped with error: {}", e);
            }
        });

        info!(
            "Listening on {}:{}",
            self.config.server.host, self.config.server.port
        );
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down application...");

        let handle = self.server.lock().take();
        if let Some(handle) = handle {
            info!("Stopping API server...");
            handle.stop(true).await;
        }

        info!(
            "Stopping session timers ({} sessions open)...",
            self.verification_service.active_sessions()
        );
        self.verification_service.shutdown().await;

        info!("Application shutdown complete");
        Ok(())
    }
}
