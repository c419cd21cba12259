// [apps/controller/src/kernel.rs]
/**
 * =================================================================
 * APARATO: CONTROLLER KERNEL (V5.3 - GRACEFUL STRATA)
 * CLASIFICACIÓN: COMPOSITION ROOT (ESTRATO L1-APP)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 *
 * VISION HIPER-HOLÍSTICA:
 * Actúa como la placa base donde se conectan todos los servicios: el
 * esquema se sincroniza ANTES de abrir el socket TCP (ningún agente
 * observa tablas a medio solidificar), el barrido de vivacidad arranca
 * como daemon y el apagado propaga una señal con gracia acotada a todos
 * los hilos de fondo.
 * =================================================================
 */

use crate::config::ControllerConfig;
use crate::routes::create_controller_router;
use crate::services::spawn_sweeper;
use crate::state::AppState;
use netwatcher_infra_db::DbClient;
use std::net::{IpAddr, SocketAddr};
use tokio::sync::watch;
use tracing::{error, info, instrument};

pub struct ControllerKernel {
    pub server_network_port: u16,
    pub application_state: AppState,
}

impl ControllerKernel {
    /**
     * Realiza la ignición del cliente de persistencia y el estado maestro.
     * La conexión (y el esquema) se establecen antes de levantar servicios.
     */
    #[instrument(skip(database_access_token, config))]
    pub async fn ignite(
        database_connection_url: &str,
        database_access_token: Option<String>,
        listening_port: u16,
        config: ControllerConfig,
    ) -> Self {
        let database_client = DbClient::connect(database_connection_url, database_access_token)
            .await
            .expect("FATAL: Database link collapse. Ignition aborted.");

        Self {
            server_network_port: listening_port,
            application_state: AppState::new(database_client, config),
        }
    }

    /**
     * Lanza los daemons de fondo y el servidor HTTP principal.
     */
    pub async fn launch_operations(self) {
        let shared_application_state = self.application_state.clone();

        // --- 1. SEÑAL DE APAGADO COMPARTIDA ---
        let (shutdown_sender, shutdown_receiver) = watch::channel(false);

        // --- 2. DAEMON DE VIVACIDAD (C10) ---
        spawn_sweeper(shared_application_state.clone(), shutdown_receiver);

        // --- 3. IGNICIÓN DEL TRANSPORTE HTTP (AXUM) ---
        let controller_router = create_controller_router(shared_application_state);

        let bind_address = SocketAddr::new(
            "0.0.0.0".parse::<IpAddr>().expect("static address parses"),
            self.server_network_port,
        );

        info!("🚀 [KERNEL_ONLINE]: NetWatcher control plane listening at {}", bind_address);

        let tcp_listener = tokio::net::TcpListener::bind(bind_address)
            .await
            .expect("CRITICAL_FAULT: Failed to bind network port.");

        let graceful_server = axum::serve(tcp_listener, controller_router)
            .with_graceful_shutdown(async move {
                wait_for_shutdown_signal().await;
                // Propaga la señal a los daemons; la gracia está acotada
                // por el cierre del runtime.
                let _ = shutdown_sender.send(true);
            });

        if let Err(server_error) = graceful_server.await {
            error!("💀 [KERNEL_COLLAPSE]: Runtime failure: {}", server_error);
            std::process::exit(1);
        }

        info!("🛑 [KERNEL_OFFLINE]: Control plane drained and stopped.");
    }
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("CRITICAL_FAULT: Failed to install Ctrl+C handler.");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("CRITICAL_FAULT: Failed to install SIGTERM handler.")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("🛑 [SHUTDOWN_SIGNAL]: Process termination requested.");
}
