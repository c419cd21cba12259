// [apps/controller/src/main.rs]
/*!
 * =================================================================
 * APARATO: CONTROLLER MAIN ENTRY POINT (V5.0)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L3)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 *
 * # Mathematical Proof (Deterministic Ignition):
 * El proceso garantiza que la sincronización del esquema ocurra antes
 * que la apertura del socket TCP, previniendo estados de carrera donde
 * un agente envíe mediciones contra tablas aún no solidificadas.
 * =================================================================
 */

use netwatcher_controller::prelude::*;

use dotenvy::dotenv;
use netwatcher_shared_watchtower::init_tracing;
use tracing::info;

/**
 * Punto de ignición del binario del controlador.
 */
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. CARGA DE ENTORNO
    dotenv().ok();

    // 2. INICIALIZACIÓN DE OBSERVABILIDAD (WATCHTOWER)
    init_tracing("netwatcher_controller");

    // 3. RUNTIME MULTIHILO
    let runtime_controller = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime_controller.block_on(async {
        info!("🛰️  [CONTROL_PLANE]: Global ignition sequence starting...");

        // 4. ADQUISICIÓN DE COORDENADAS
        let database_connection_url = std::env::var("DATABASE_URL")
            .expect("CRITICAL_FAULT: DATABASE_URL not defined in runtime environment.");

        let database_access_token = std::env::var("TURSO_AUTH_TOKEN").ok();

        let listening_network_port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .unwrap_or(3000);

        let controller_config = ControllerConfig::from_env();

        // 5. CONSTRUCCIÓN DEL KERNEL (ESTRATO L1-APP)
        let kernel_instance = ControllerKernel::ignite(
            &database_connection_url,
            database_access_token,
            listening_network_port,
            controller_config,
        )
        .await;

        // 6. IGNICIÓN DE OPERACIONES
        info!("🚀 [NETWATCHER_ONLINE]: Control plane operational on port {}.", listening_network_port);
        kernel_instance.launch_operations().await;

        Ok(())
    })
}
