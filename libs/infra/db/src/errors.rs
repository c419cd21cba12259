// [libs/infra/db/src/errors.rs]
/*!
 * =================================================================
 * APARATO: DATABASE ERROR CATALOG (V4.1 - CONTROL PLANE)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE PERSISTENCIA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TOMBSTONE AWARENESS: 'AgentGone' distingue el borrado lógico de la
 *    simple ausencia, permitiendo que la capa de autenticación traduzca
 *    a una respuesta terminal (410) en vez de 401/404.
 * 2. PANOPTICON COMPLIANCE: Prefijos de estrato para el renderizado
 *    cromático en el panel.
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// Error de enlace físico o de red con el cluster libSQL.
    #[error("[L3_DB_NET_FAULT]: DATABASE_UPLINK_SEVERED -> {0}")]
    ConnectionError(String),

    /// Fallo en la configuración del entorno (variables vacías o malformadas).
    #[error("[L3_DB_CONFIG_FAULT]: STRATEGIC_ENV_VOID -> {0}")]
    ConfigurationError(String),

    /// Error de sintaxis o ejecución devuelto por el motor libSQL.
    #[error("[L3_DB_QUERY_FAULT]: SQL_QUERY_REJECTED -> {0}")]
    QueryError(#[from] libsql::Error),

    /// Fallo en la transformación de tipos entre SQLite y el dominio Rust.
    #[error("[L3_DB_MAPPING_FAULT]: DATA_MAPPING_VIOLATION -> {0}")]
    MappingError(String),

    /// Error al comprometer cambios en una secuencia multi-tabla.
    #[error("[L3_DB_FAULT]: TRANSACTION_COLLAPSE")]
    TransactionError,

    // --- ESTRATO DE IDENTIDAD Y METADATOS ---

    /// La entidad solicitada no existe en las tablas activas.
    #[error("[L3_STORE_FAULT]: IDENTIFIER_NOT_FOUND")]
    NotFound,

    /// La fila existe pero su tombstone de borrado lógico está activa.
    /// Señal terminal: el agente debe dejar de reintentar.
    #[error("[L3_STORE_FAULT]: AGENT_TOMBSTONE_ACTIVE")]
    AgentGone,

    /// Violación de unicidad semántica (nombre de workspace, email de
    /// membresía, token de share).
    #[error("[L3_STORE_FAULT]: UNIQUENESS_VIOLATION -> {0}")]
    Conflict(String),

    // --- ESTRATO DE GOBERNANZA DE MEMBRESÍA ---

    /// La transferencia de propiedad rompería el invariante de OWNER único.
    #[error("[L3_GOVERNANCE_FAULT]: OWNER_INVARIANT_VIOLATION -> {0}")]
    OwnershipViolation(String),
}
