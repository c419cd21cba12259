// [apps/controller/src/routes.rs]
/*!
 * =================================================================
 * APARATO: CONTROLLER ROUTING MATRIX (V5.1 - STRATA TOPOLOGY)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: COMPOSICIÓN DE ESTRATOS DE AGENTE, VISOR Y SHARE
 *
 * VISION HIPER-HOLÍSTICA:
 * La topología separa tres planos de confianza:
 * 1. Tráfico de AGENTES (sobre PSK en el cuerpo/query, sin middleware).
 * 2. Tráfico de VISORES (sesión resuelta por el guardia perimetral).
 * 3. Gateway de SHARES (token en la ruta, contraseña por petición).
 * =================================================================
 */

use crate::handlers::{agents, alerts, ingest, share, stream, viewer};
use crate::middleware::viewer_guard;
use crate::state::AppState;
use axum::{
    http::{header, Method},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

pub fn create_controller_router(application_shared_state: AppState) -> Router {
    // Escudo de red: CORS para el panel y herramientas de operación.
    let network_security_shield = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    // ESTRATO DE AGENTES: autenticación por sobre (PIN/PSK), sin middleware.
    let agent_wire_stratum = Router::new()
        .route("/agents/:id/bootstrap", post(agents::AgentLifecycleHandler::handle_bootstrap))
        .route("/agents/:id/heartbeat", post(agents::AgentLifecycleHandler::handle_heartbeat))
        .route("/probes/:id/data", post(agents::AgentIngestHandler::handle_probe_data))
        // Canal alternativo de alta frecuencia (TrafficSim).
        .route("/ws/agent", get(ingest::establish_agent_uplink));

    // ESTRATO DE VISORES: sesión inyectada por el guardia perimetral.
    let viewer_stratum = Router::new()
        // Administración de agentes y credenciales
        .route("/agents", post(agents::AgentLifecycleHandler::handle_create_agent))
        .route("/agents/:id", delete(agents::AgentLifecycleHandler::handle_retire_agent))
        .route("/agents/:id/rotate-psk", post(agents::AgentLifecycleHandler::handle_rotate_psk))
        .route("/agents/:id/trafficsim", put(agents::AgentLifecycleHandler::handle_update_trafficsim))
        .route("/agents/:id/share", post(agents::AgentLifecycleHandler::handle_create_share))
        .route("/share/:token", delete(share::ShareGatewayHandler::handle_revoke_share))

        // Administración de sondas
        .route("/agents/:id/probes", post(agents::AgentLifecycleHandler::handle_create_probe)
            .get(viewer::ViewerQueryHandler::handle_list_probes))
        .route("/probes/:id", put(agents::ProbeAdministrationHandler::handle_update_probe)
            .delete(agents::ProbeAdministrationHandler::handle_delete_probe))

        // Inventarios y consultas históricas
        .route("/workspaces", get(viewer::ViewerQueryHandler::handle_list_workspaces))
        .route("/workspaces/:id/agents", get(viewer::ViewerQueryHandler::handle_list_agents))
        .route("/probes/:id/data", get(viewer::ViewerQueryHandler::handle_probe_data))

        // Reglas y alertas
        .route("/alert-rules", post(alerts::AlertRuleAdministrationHandler::handle_create_rule))
        .route("/alert-rules/:id", put(alerts::AlertRuleAdministrationHandler::handle_update_rule)
            .delete(alerts::AlertRuleAdministrationHandler::handle_delete_rule))
        .route("/alerts", get(alerts::AlertHandler::handle_list_alerts))
        .route("/alerts/:id/ack", post(alerts::AlertHandler::handle_acknowledge))
        .route("/alerts/:id/resolve", post(alerts::AlertHandler::handle_resolve))

        // Enlace en vivo del panel
        .route("/ws/viewer", get(stream::establish_viewer_uplink))
        .layer(middleware::from_fn_with_state(application_shared_state.clone(), viewer_guard));

    // GATEWAY DE SHARES: token en la ruta, contraseña por petición.
    let share_gateway_stratum = Router::new()
        .route("/:token/info", get(share::ShareGatewayHandler::handle_share_info))
        .route("/:token/agent", get(share::ShareGatewayHandler::handle_share_agent))
        .route("/:token/probe/:id/data", get(share::ShareGatewayHandler::handle_share_probe_data))
        .route("/:token/agent-name/:id", get(share::ShareGatewayHandler::handle_share_agent_name))
        .route("/:token/ws", get(share::ShareGatewayHandler::establish_share_uplink));

    // COMPOSICIÓN GLOBAL (Root Topology)
    Router::new()
        .route("/health", get(ingest::handle_health))
        .nest("/api/v1", agent_wire_stratum.merge(viewer_stratum))
        .nest("/share", share_gateway_stratum)
        .layer(network_security_shield)
        .with_state(application_shared_state)
}
