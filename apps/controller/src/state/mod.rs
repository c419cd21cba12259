// [apps/controller/src/state/mod.rs]
/*!
 * =================================================================
 * APARATO: CONTROLLER STATE ORCHESTRATOR (V5.0 - COMPOSITION ROOT)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: ORQUESTACIÓN DE REPOSITORIOS, HUB Y DESPACHADOR
 *
 * # Logic:
 * El estado es la placa base donde se conectan los estratos: el cliente
 * de persistencia, los nueve repositorios de autoridad única, el hub de
 * suscripción proceso-global y el despachador de notificaciones. Todo es
 * `Arc<T>` inmutable compartido; ningún estrato expone variables
 * mutables a nivel de paquete.
 * =================================================================
 */

use crate::config::ControllerConfig;
use crate::services::authenticator::AgentAuthenticator;
use crate::services::dispatcher::NotificationDispatcher;
use crate::services::hub::SubscriptionHub;
use netwatcher_infra_db::repositories::{
    AgentRepository, AlertRepository, AlertRuleRepository, IdentityRepository, PinRepository,
    ProbeRepository, RouteBaselineRepository, ShareLinkRepository, TimeSeriesRepository,
};
use netwatcher_infra_db::DbClient;
use std::sync::Arc;
use tracing::debug;

/// Contenedor de estado compartido (thread-safe) del controlador.
#[derive(Clone)]
pub struct AppState {
    /// Cliente de enlace con el motor libSQL.
    pub database_client: DbClient,
    /// Configuración capturada en la ignición.
    pub config: ControllerConfig,

    /// Registro proceso-global de visores en vivo (C8).
    pub subscription_hub: Arc<SubscriptionHub>,
    /// Fan-out de notificaciones con reintentos acotados (C6).
    pub notification_dispatcher: Arc<NotificationDispatcher>,
    /// Máquina de estados PIN->PSK y autenticación por petición (C2).
    pub authenticator: Arc<AgentAuthenticator>,

    // --- REPOSITORIOS DE AUTORIDAD ÚNICA (C1/C3/C4) ---
    pub identity_repository: Arc<IdentityRepository>,
    pub agent_repository: Arc<AgentRepository>,
    pub pin_repository: Arc<PinRepository>,
    pub probe_repository: Arc<ProbeRepository>,
    pub alert_rule_repository: Arc<AlertRuleRepository>,
    pub alert_repository: Arc<AlertRepository>,
    pub route_baseline_repository: Arc<RouteBaselineRepository>,
    pub share_link_repository: Arc<ShareLinkRepository>,
    pub timeseries_repository: Arc<TimeSeriesRepository>,
}

impl AppState {
    /**
     * Forja el estado maestro inyectando todas las dependencias.
     */
    pub fn new(database_client: DbClient, config: ControllerConfig) -> Self {
        debug!("🧬 [APP_STATE]: Executing controller ignition sequence V5.0...");

        let notification_dispatcher = NotificationDispatcher::new(config.webhook_retry_budget);
        let authenticator = Arc::new(AgentAuthenticator::new(
            database_client.clone(),
            config.clone(),
        ));

        Self {
            subscription_hub: Arc::new(SubscriptionHub::new()),
            notification_dispatcher,
            authenticator,

            identity_repository: Arc::new(IdentityRepository::new(database_client.clone())),
            agent_repository: Arc::new(AgentRepository::new(database_client.clone())),
            pin_repository: Arc::new(PinRepository::new(database_client.clone())),
            probe_repository: Arc::new(ProbeRepository::new(database_client.clone())),
            alert_rule_repository: Arc::new(AlertRuleRepository::new(database_client.clone())),
            alert_repository: Arc::new(AlertRepository::new(database_client.clone())),
            route_baseline_repository: Arc::new(RouteBaselineRepository::new(database_client.clone())),
            share_link_repository: Arc::new(ShareLinkRepository::new(database_client.clone())),
            timeseries_repository: Arc::new(TimeSeriesRepository::new(database_client.clone())),

            database_client,
            config,
        }
    }
}
