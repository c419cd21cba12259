// [apps/controller/src/config.rs]
/*!
 * =================================================================
 * APARATO: CONTROLLER CONFIGURATION (V2.1 - ENV SURFACE)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L1-APP)
 * RESPONSABILIDAD: CAPTURA ÚNICA DEL ENTORNO CON DEFAULTS DOCUMENTADOS
 * =================================================================
 */

use std::env;

/// Configuración del plano de control, capturada una vez en la ignición.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Horas de vigencia de una invitación de membresía. Default: 168 (7 días).
    pub email_invite_expiry_hours: i64,
    /// Intervalo del barrido de vivacidad offline. Default: 60 s.
    pub offline_sweep_interval_seconds: u64,
    /// Reintentos máximos de entrega de webhook. Default: 3.
    pub webhook_retry_budget: u32,
    /// Longitud del PSK en bytes aleatorios (hex duplica). Default: 32.
    pub psk_length_bytes: usize,
    /// Dígitos del PIN de bootstrap. Default: 9.
    pub pin_length_digits: usize,
    /// Coste bcrypt para PINs y contraseñas de share. Default: DEFAULT_COST.
    pub password_hash_cost: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            email_invite_expiry_hours: 168,
            offline_sweep_interval_seconds: 60,
            webhook_retry_budget: 3,
            psk_length_bytes: 32,
            pin_length_digits: 9,
            password_hash_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl ControllerConfig {
    /// Hidrata la configuración desde el entorno, con defaults documentados.
    /// Valores malformados caen al default en vez de abortar la ignición.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            email_invite_expiry_hours: read_env("EMAIL_INVITE_EXPIRY_HOURS", defaults.email_invite_expiry_hours),
            offline_sweep_interval_seconds: read_env("OFFLINE_SWEEP_INTERVAL_SECONDS", defaults.offline_sweep_interval_seconds),
            webhook_retry_budget: read_env("WEBHOOK_RETRY_BUDGET", defaults.webhook_retry_budget),
            psk_length_bytes: read_env("PSK_LENGTH_BYTES", defaults.psk_length_bytes),
            pin_length_digits: read_env("PIN_LENGTH_DIGITS", defaults.pin_length_digits),
            password_hash_cost: read_env("PASSWORD_HASH_COST", defaults.password_hash_cost),
        }
    }
}

fn read_env<T: std::str::FromStr>(variable_name: &str, fallback: T) -> T {
    env::var(variable_name)
        .ok()
        .and_then(|raw| raw.parse::<T>().ok())
        .unwrap_or(fallback)
}
