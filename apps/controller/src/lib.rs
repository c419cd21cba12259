// [apps/controller/src/lib.rs]
/*!
 * =================================================================
 * APARATO: CONTROLLER LIBRARY ROOT (V5.0)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L1-APP)
 * RESPONSABILIDAD: EXPOSICIÓN NOMINAL DE MÓDULOS PARA BINARIO Y TESTS
 * =================================================================
 */

pub mod config;
pub mod errors;
pub mod kernel;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod handlers;
pub mod services;

pub mod prelude {
    pub use crate::config::ControllerConfig;
    pub use crate::kernel::ControllerKernel;
    pub use crate::state::AppState;
}
