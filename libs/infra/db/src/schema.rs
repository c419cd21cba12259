// [libs/infra/db/src/schema.rs]
/**
 * =================================================================
 * APARATO: CONTROL PLANE SCHEMA (V5.0 - OBSERVABILITY STRATA)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GOBERNANZA ESTRUCTURAL E IDEMPOTENCIA TOTAL
 *
 * VISION HIPER-HOLÍSTICA:
 * 1. TENANT STRATA: Workspaces, miembros y sesiones con tombstones.
 * 2. AGENT STRATA: Agentes con borrado lógico, PINs de un solo uso.
 * 3. TELEMETRY STRATA: Serie temporal append-only de mediciones con
 *    índices de aceleración para consultas por rango.
 * 4. IDEMPOTENCIA: Migraciones tolerantes para despliegues en caliente.
 * =================================================================
 */

use anyhow::{Context, Result};
use libsql::Connection;
use tracing::{debug, info, instrument, warn};

/**
 * ESTRATO 1: SOLIDIFICACIÓN (Génesis de Tablas)
 * Define las entidades base del plano de control NetWatcher.
 */
const CONTROL_PLANE_TABLES: &[(&str, &str)] = &[
    ("TABLE_WORKSPACES", r#"
        CREATE TABLE IF NOT EXISTS workspaces (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            owner_user_id INTEGER,
            created_at TEXT NOT NULL,
            deleted_at TEXT
        );
    "#),
    ("TABLE_USERS", r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL
        );
    "#),
    ("TABLE_USER_SESSIONS", r#"
        CREATE TABLE IF NOT EXISTS user_sessions (
            token TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            expires_at TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
    "#),
    ("TABLE_MEMBERS", r#"
        CREATE TABLE IF NOT EXISTS members (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            workspace_id INTEGER NOT NULL,
            user_id INTEGER,
            email TEXT NOT NULL,
            role TEXT NOT NULL,
            invite_token TEXT,
            invite_expires_at TEXT,
            invited_at TEXT,
            accepted_at TEXT,
            revoked_at TEXT,
            UNIQUE(workspace_id, email)
        );
    "#),
    ("TABLE_AGENTS", r#"
        CREATE TABLE IF NOT EXISTS agents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            workspace_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            location TEXT NOT NULL DEFAULT '',
            last_seen_at TEXT,
            version TEXT NOT NULL DEFAULT '',
            labels_json TEXT NOT NULL DEFAULT '{}',
            metadata_json TEXT NOT NULL DEFAULT '{}',
            initialized INTEGER NOT NULL DEFAULT 0,
            psk_hash TEXT,
            trafficsim_enabled INTEGER NOT NULL DEFAULT 0,
            trafficsim_host TEXT NOT NULL DEFAULT '',
            trafficsim_port INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            deleted_at TEXT
        );
    "#),
    ("TABLE_AGENT_PINS", r#"
        CREATE TABLE IF NOT EXISTS agent_pins (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            workspace_id INTEGER NOT NULL,
            agent_id INTEGER NOT NULL,
            pin_hash TEXT NOT NULL,
            pin_plaintext TEXT,
            expires_at TEXT,
            consumed_at TEXT,
            created_at TEXT NOT NULL
        );
    "#),
    ("TABLE_PROBES", r#"
        CREATE TABLE IF NOT EXISTS probes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            workspace_id INTEGER NOT NULL,
            agent_id INTEGER NOT NULL,
            type TEXT NOT NULL,
            name TEXT NOT NULL DEFAULT '',
            interval_seconds INTEGER NOT NULL DEFAULT 60,
            duration_seconds INTEGER NOT NULL DEFAULT 0,
            count INTEGER NOT NULL DEFAULT 0,
            notifications INTEGER NOT NULL DEFAULT 0,
            server_mode INTEGER NOT NULL DEFAULT 0,
            reverse_of_probe_id INTEGER,
            labels_json TEXT NOT NULL DEFAULT '{}',
            metadata_json TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL
        );
    "#),
    ("TABLE_PROBE_TARGETS", r#"
        CREATE TABLE IF NOT EXISTS probe_targets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            probe_id INTEGER NOT NULL,
            host TEXT,
            target_agent_id INTEGER,
            position INTEGER NOT NULL DEFAULT 0
        );
    "#),
    ("TABLE_ALERT_RULES", r#"
        CREATE TABLE IF NOT EXISTS alert_rules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            workspace_id INTEGER NOT NULL,
            probe_id INTEGER,
            agent_id INTEGER,
            metric TEXT NOT NULL,
            op TEXT NOT NULL,
            threshold REAL NOT NULL,
            secondary_metric TEXT,
            secondary_op TEXT,
            secondary_threshold REAL,
            logical_op TEXT,
            severity TEXT NOT NULL DEFAULT 'warning',
            notify_email INTEGER NOT NULL DEFAULT 0,
            webhook_url TEXT,
            webhook_secret TEXT,
            enabled INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        );
    "#),
    ("TABLE_ALERTS", r#"
        CREATE TABLE IF NOT EXISTS alerts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            rule_id INTEGER NOT NULL,
            workspace_id INTEGER NOT NULL,
            probe_id INTEGER,
            agent_id INTEGER,
            scope_key TEXT NOT NULL,
            probe_type TEXT,
            probe_name TEXT,
            probe_target TEXT,
            agent_name TEXT,
            metric TEXT NOT NULL,
            value REAL NOT NULL,
            threshold REAL NOT NULL,
            severity TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            message TEXT NOT NULL DEFAULT '',
            triggered_at TEXT NOT NULL,
            acknowledged_at TEXT,
            acknowledged_by INTEGER,
            resolved_at TEXT
        );
    "#),
    ("TABLE_ROUTE_BASELINES", r#"
        CREATE TABLE IF NOT EXISTS route_baselines (
            probe_id INTEGER PRIMARY KEY,
            fingerprint TEXT NOT NULL,
            path_human TEXT NOT NULL DEFAULT '',
            hop_count INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL
        );
    "#),
    ("TABLE_SHARE_LINKS", r#"
        CREATE TABLE IF NOT EXISTS share_links (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            token TEXT NOT NULL UNIQUE,
            workspace_id INTEGER NOT NULL,
            agent_id INTEGER NOT NULL,
            password_hash TEXT,
            expires_at TEXT NOT NULL,
            allow_speedtest INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );
    "#),
    ("TABLE_PROBE_SAMPLES", r#"
        CREATE TABLE IF NOT EXISTS probe_samples (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            probe_id INTEGER NOT NULL,
            agent_id INTEGER NOT NULL,
            type TEXT NOT NULL,
            created_at TEXT NOT NULL,
            received_at TEXT NOT NULL,
            payload_json TEXT NOT NULL,
            triggered INTEGER NOT NULL DEFAULT 0,
            triggered_reason TEXT
        );
    "#),
];

/**
 * ESTRATO 2: EVOLUCIÓN (Mutaciones de Columna)
 * Asegura que las tablas de despliegues previos adquieran las nuevas
 * capacidades sin pérdida de datos.
 */
const EVOLUTIONARY_STRATA: &[(&str, &str)] = &[
    ("AGENT_VERSION", "ALTER TABLE agents ADD COLUMN version TEXT NOT NULL DEFAULT ''"),
    ("AGENT_TRAFFICSIM_PORT", "ALTER TABLE agents ADD COLUMN trafficsim_port INTEGER NOT NULL DEFAULT 0"),
    ("SHARE_ALLOW_SPEEDTEST", "ALTER TABLE share_links ADD COLUMN allow_speedtest INTEGER NOT NULL DEFAULT 0"),
    ("RULE_LOGICAL_OP", "ALTER TABLE alert_rules ADD COLUMN logical_op TEXT"),
    ("SAMPLE_TRIGGERED_REASON", "ALTER TABLE probe_samples ADD COLUMN triggered_reason TEXT"),
];

/**
 * ESTRATO 3: ENDURECIMIENTO (Índices y Guardias de Unicidad)
 *
 * El índice parcial 'IDX_ALERTS_ACTIVE_GUARD' lineariza el ciclo de vida
 * de alertas: a lo sumo una alerta activa por (regla, alcance) en todo
 * instante. La deduplicación de disparos se apoya en él, no en RAM.
 */
const ACCELERATION_INDEXES: &[(&str, &str)] = &[
    ("IDX_ALERTS_ACTIVE_GUARD", "CREATE UNIQUE INDEX IF NOT EXISTS idx_alerts_active_guard ON alerts(rule_id, scope_key) WHERE status = 'active';"),
    ("IDX_SAMPLES_RANGE", "CREATE INDEX IF NOT EXISTS idx_samples_probe_type_created ON probe_samples(probe_id, type, created_at);"),
    ("IDX_AGENTS_WORKSPACE", "CREATE INDEX IF NOT EXISTS idx_agents_workspace ON agents(workspace_id, deleted_at);"),
    ("IDX_PROBES_AGENT", "CREATE INDEX IF NOT EXISTS idx_probes_agent ON probes(agent_id);"),
    ("IDX_RULES_WORKSPACE", "CREATE INDEX IF NOT EXISTS idx_rules_workspace ON alert_rules(workspace_id, enabled);"),
    ("IDX_PINS_AGENT", "CREATE INDEX IF NOT EXISTS idx_pins_agent ON agent_pins(workspace_id, agent_id, consumed_at);"),
    ("IDX_MEMBERS_WORKSPACE", "CREATE INDEX IF NOT EXISTS idx_members_workspace ON members(workspace_id, role);"),
    ("IDX_ALERTS_WORKSPACE", "CREATE INDEX IF NOT EXISTS idx_alerts_workspace ON alerts(workspace_id, status, triggered_at);"),
];

/**
 * Ejecuta la secuencia maestra de sincronización del esquema estructural.
 *
 * # Errors:
 * Retorna error si alguna tabla base falla en solidificarse, indicando
 * un colapso en el enlace con el motor libSQL.
 */
#[instrument(skip(database_connection))]
pub async fn apply_control_plane_schema(database_connection: &Connection) -> Result<()> {
    info!("🏗️ [SCHEMA_ENGINE]: Initiating structural synchronization V5.0...");

    solidify_base_strata(database_connection).await?;
    execute_evolutionary_repair(database_connection).await?;
    harden_access_layer(database_connection).await?;

    info!("✅ [SCHEMA_ENGINE]: Control plane schema level and certified.");
    Ok(())
}

async fn solidify_base_strata(db: &Connection) -> Result<()> {
    for (identifier, sql) in CONTROL_PLANE_TABLES {
        debug!("  ↳ Solidifying: {}", identifier);
        db.execute(*sql, ()).await
            .with_context(|| format!("CRITICAL_SOLIDIFICATION_FAULT: {}", identifier))?;
    }
    Ok(())
}

async fn execute_evolutionary_repair(db: &Connection) -> Result<()> {
    for (identifier, sql) in EVOLUTIONARY_STRATA {
        match db.execute(*sql, ()).await {
            Ok(_) => info!("  🟢 [REPAIR_OK]: Applied evolutionary stratum {}", identifier),
            Err(fault) => {
                let message = fault.to_string();
                if message.contains("duplicate column name") {
                    debug!("  ⚪ [REPAIR_SKIP]: {} already level.", identifier);
                } else {
                    warn!("  ⚠️ [REPAIR_BYPASS]: {} check incomplete: {}", identifier, message);
                }
            }
        }
    }
    Ok(())
}

async fn harden_access_layer(db: &Connection) -> Result<()> {
    for (identifier, sql) in ACCELERATION_INDEXES {
        debug!("  ↳ Hardening: {}", identifier);
        db.execute(*sql, ()).await
            .with_context(|| format!("CRITICAL_HARDENING_FAULT: {}", identifier))?;
    }
    Ok(())
}
