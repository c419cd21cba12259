// [apps/controller/src/services/authenticator.rs]
/*!
 * =================================================================
 * APARATO: AGENT AUTHENTICATOR (V5.1 - PIN/PSK STATE MACHINE)
 * CLASIFICACIÓN: SECURITY STRATUM (ESTRATO L4/C2)
 * RESPONSABILIDAD: BOOTSTRAP PIN->PSK Y AUTENTICACIÓN POR PETICIÓN
 *
 * # Logic:
 * Máquina de estados por agente: UNINITIALISED -> PIN_ISSUED -> INITIALISED.
 * El PIN se genera con el RNG del sistema (dígitos uniformes, muestreo de
 * enteros sin sesgo de módulo) y se almacena como hash bcrypt; la
 * verificación es de tiempo constante. El PSK es material aleatorio de
 * 256 bits cuyo digest SHA-256 se compara como secuencia de longitud
 * fija. La tombstone de un agente retirado produce la señal terminal
 * AgentDeleted (410) en vez de InvalidPSK.
 * =================================================================
 */

use crate::config::ControllerConfig;
use chrono::Utc;
use netwatcher_domain_models::wire::AgentEnvelope;
use netwatcher_infra_db::repositories::{AgentRepository, PinRepository};
use netwatcher_infra_db::{DbClient, DbError};
use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Fallos semánticos del circuito de bootstrap y autenticación.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthError {
    #[error("[L4_AUTH_FAULT]: AGENT_NOT_FOUND")]
    NotFound,

    /// Ningún PIN sin consumir coincide con el material presentado.
    #[error("[L4_AUTH_FAULT]: PIN_INVALID")]
    InvalidPin,

    /// El PIN coincidente existe pero su vigencia terminó.
    #[error("[L4_AUTH_FAULT]: PIN_EXPIRED")]
    PinExpired,

    /// Carrera de consumo: otro bootstrap selló el PIN primero.
    #[error("[L4_AUTH_FAULT]: PIN_ALREADY_CONSUMED")]
    PinMismatch,

    #[error("[L4_AUTH_FAULT]: PSK_DIGEST_MISMATCH")]
    InvalidPsk,

    /// Tombstone activa: señal terminal, el agente debe detenerse.
    #[error("[L4_AUTH_FAULT]: AGENT_TOMBSTONED")]
    AgentDeleted,

    #[error("[L4_AUTH_FAULT]: STORAGE_COLLAPSE -> {0}")]
    Storage(String),
}

impl From<DbError> for AuthError {
    fn from(fault: DbError) -> Self {
        match fault {
            DbError::NotFound => AuthError::NotFound,
            DbError::AgentGone => AuthError::AgentDeleted,
            other => AuthError::Storage(other.to_string()),
        }
    }
}

/// Capacidad de sesión ligera vinculada a (workspace, agente) tras una
/// autenticación PSK exitosa.
#[derive(Debug, Clone, Copy)]
pub struct AgentSession {
    pub workspace_id: i64,
    pub agent_id: i64,
}

/// Autenticador de agentes sobre los repositorios de identidad.
pub struct AgentAuthenticator {
    agent_repository: AgentRepository,
    pin_repository: PinRepository,
    config: ControllerConfig,
}

impl AgentAuthenticator {
    pub fn new(database_client: DbClient, config: ControllerConfig) -> Self {
        Self {
            agent_repository: AgentRepository::new(database_client.clone()),
            pin_repository: PinRepository::new(database_client),
            config,
        }
    }

    // --- ESTRATO DE GENERACIÓN DE MATERIAL ---

    /// PIN numérico de n dígitos con selección uniforme por dígito.
    /// `gen_range` muestrea enteros sin sesgo de módulo.
    pub fn generate_pin(&self) -> String {
        let mut rng = rand::rngs::OsRng;
        (0..self.config.pin_length_digits)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect()
    }

    /// PSK: bytes aleatorios del sistema, hex-encodificados (256 bits -> 64 chars).
    pub fn generate_psk(&self) -> String {
        let mut material = vec![0u8; self.config.psk_length_bytes];
        rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut material);
        hex::encode(material)
    }

    /// Digest SHA-256 del PSK para almacenamiento y comparación.
    pub fn hash_psk(psk_plaintext: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(psk_plaintext.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Hash bcrypt de un PIN (coste configurable, ~100 ms objetivo).
    pub fn hash_pin(&self, pin_plaintext: &str) -> Result<String, AuthError> {
        bcrypt::hash(pin_plaintext, self.config.password_hash_cost)
            .map_err(|fault| AuthError::Storage(format!("PIN_HASH_FAULT: {}", fault)))
    }

    // --- ESTRATO DE TRANSICIONES ---

    /**
     * Emite un PIN nuevo para un agente (transición -> PIN_ISSUED).
     * Retorna el plaintext para una única exhibición administrativa.
     */
    #[instrument(skip(self), fields(agent = agent_id))]
    pub async fn issue_pin(
        &self,
        workspace_id: i64,
        agent_id: i64,
        expires_in_hours: Option<i64>,
    ) -> Result<String, AuthError> {
        let pin_plaintext = self.generate_pin();
        let pin_hash = self.hash_pin(&pin_plaintext)?;
        let expires_at = expires_in_hours.map(|hours| Utc::now() + chrono::Duration::hours(hours));

        self.pin_repository
            .issue_pin(workspace_id, agent_id, &pin_hash, &pin_plaintext, expires_at)
            .await?;

        Ok(pin_plaintext)
    }

    /**
     * Bootstrap: intercambia un PIN válido por un PSK recién forjado
     * (transición PIN_ISSUED -> INITIALISED).
     *
     * El consumo del PIN y la limpieza de su plaintext ocurren en la misma
     * sentencia; el PSK en claro retorna exactamente una vez.
     *
     * # Errors:
     * - `AuthError::AgentDeleted`: Tombstone activa (terminal).
     * - `AuthError::PinExpired`: El PIN coincidente está vencido.
     * - `AuthError::InvalidPin`: Ningún PIN sin consumir coincide.
     * - `AuthError::PinMismatch`: Carrera de consumo perdida.
     */
    #[instrument(skip(self, presented_pin), fields(agent = agent_id))]
    pub async fn bootstrap(
        &self,
        workspace_id: i64,
        agent_id: i64,
        presented_pin: &str,
    ) -> Result<String, AuthError> {
        // La ruta Unscoped distingue tombstone de ausencia.
        let agent = self.agent_repository.fetch_unscoped(workspace_id, agent_id).await?;
        if agent.is_deleted() {
            warn!("🪦 [BOOTSTRAP_TERMINAL]: Retired agent {} attempted bootstrap.", agent_id);
            return Err(AuthError::AgentDeleted);
        }

        let now = Utc::now();
        let unconsumed_pins = self.pin_repository.unconsumed_pins(workspace_id, agent_id).await?;

        for candidate_pin in unconsumed_pins {
            // Verificación bcrypt: coste intencional, tiempo constante.
            let matches = bcrypt::verify(presented_pin, &candidate_pin.pin_hash)
                .map_err(|fault| AuthError::Storage(format!("PIN_VERIFY_FAULT: {}", fault)))?;

            if !matches {
                continue;
            }

            if !candidate_pin.is_pending(now) {
                return Err(AuthError::PinExpired);
            }

            // Consumo atómico: plaintext limpiado y consumed_at estampado
            // en la misma sentencia. Una carrera perdida es PinMismatch.
            if !self.pin_repository.consume_pin(candidate_pin.id).await? {
                return Err(AuthError::PinMismatch);
            }

            let psk_plaintext = self.generate_psk();
            self.agent_repository
                .seal_bootstrap(workspace_id, agent_id, &Self::hash_psk(&psk_plaintext))
                .await?;

            info!("🔐 [BOOTSTRAP_SEALED]: Agent {} initialized; PSK digest stored.", agent_id);
            return Ok(psk_plaintext);
        }

        Err(AuthError::InvalidPin)
    }

    /**
     * Rotación administrativa del PSK: sobrescribe el digest almacenado.
     * El PSK anterior queda inválido en el mismo commit.
     */
    #[instrument(skip(self))]
    pub async fn rotate_psk(&self, workspace_id: i64, agent_id: i64) -> Result<String, AuthError> {
        // Verifica existencia y tombstone antes de forjar material nuevo.
        self.agent_repository.fetch_scoped(workspace_id, agent_id).await?;

        let psk_plaintext = self.generate_psk();
        self.agent_repository
            .rotate_psk_hash(workspace_id, agent_id, &Self::hash_psk(&psk_plaintext))
            .await?;

        Ok(psk_plaintext)
    }

    /**
     * Autenticación por petición: sobre (workspace, agente, PSK).
     *
     * Orden del contrato: primero la tombstone (410 terminal), después la
     * comparación de digests (401).
     */
    #[instrument(skip(self, envelope), fields(agent = envelope.agent_id))]
    pub async fn authenticate(&self, envelope: &AgentEnvelope) -> Result<AgentSession, AuthError> {
        let agent = self
            .agent_repository
            .fetch_unscoped(envelope.workspace_id, envelope.agent_id)
            .await?;

        if agent.is_deleted() {
            return Err(AuthError::AgentDeleted);
        }

        let stored_digest = agent.psk_hash.as_deref().ok_or(AuthError::InvalidPsk)?;
        let presented_digest = Self::hash_psk(&envelope.psk);

        // Comparación de digests de longitud fija: el material secreto
        // jamás se compara directamente.
        if !constant_time_digest_eq(stored_digest.as_bytes(), presented_digest.as_bytes()) {
            return Err(AuthError::InvalidPsk);
        }

        Ok(AgentSession {
            workspace_id: envelope.workspace_id,
            agent_id: envelope.agent_id,
        })
    }
}

/// Igualdad de tiempo constante sobre secuencias de igual longitud.
fn constant_time_digest_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    let mut accumulated_difference = 0u8;
    for (left_byte, right_byte) in left.iter().zip(right.iter()) {
        accumulated_difference |= left_byte ^ right_byte;
    }
    accumulated_difference == 0
}
