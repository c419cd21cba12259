// [apps/controller/src/services/ingestion.rs]
/*!
 * =================================================================
 * APARATO: INGESTION PIPELINE (V5.1 - COMMIT BEFORE EVALUATE)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4/C7)
 * RESPONSABILIDAD: VIDA COMPLETA DE UNA MEDICIÓN ENTRANTE
 *
 * # Mathematical Proof (Durability Order):
 * La secuencia es inquebrantable: validar -> estampar received_at ->
 * append durable -> vivacidad -> evaluar -> publicar. Ni el evaluador ni
 * el hub observan jamás una muestra no comprometida; un fallo de
 * evaluación se registra y NO revierte el append. FIFO por sonda,
 * paralelo entre sondas.
 * =================================================================
 */

use crate::errors::ApiError;
use crate::services::alerting;
use crate::services::authenticator::AgentSession;
use crate::state::AppState;
use chrono::{DateTime, Utc};
use netwatcher_domain_models::sample::{ProbeSample, SamplePayload};
use serde_json::Value;
use tracing::{debug, error, instrument};

/**
 * Procesa una medición desde un agente autenticado.
 *
 * # Errors:
 * - `ApiError::NotFound`: La sonda no existe.
 * - `ApiError::Forbidden`: La sonda no pertenece al agente de la sesión.
 * - `ApiError::Validation`: El payload no satisface el esquema del tipo.
 */
#[instrument(skip(state, session, raw_payload), fields(probe = probe_id, agent = session.agent_id))]
pub async fn ingest_sample(
    state: &AppState,
    session: &AgentSession,
    probe_id: i64,
    agent_created_at: DateTime<Utc>,
    raw_payload: Value,
) -> Result<ProbeSample, ApiError> {
    // 1. RESOLUCIÓN Y AUTORIZACIÓN DE LA SONDA
    let probe = state.probe_repository.fetch_probe(probe_id).await?;
    if probe.workspace_id != session.workspace_id || probe.agent_id != session.agent_id {
        return Err(ApiError::Forbidden);
    }

    // 2. VALIDACIÓN: el payload debe satisfacer la forma del tipo declarado.
    // Los payloads desconocidos mueren aquí, jamás dentro del evaluador.
    let payload = SamplePayload::parse(probe.probe_type, raw_payload)
        .map_err(|fault| ApiError::Validation(fault.to_string()))?;

    // 3. ESTAMPADO: reloj del agente preservado, reloj del controlador añadido.
    let sample = ProbeSample {
        probe_id: probe.id,
        agent_id: session.agent_id,
        probe_type: probe.probe_type,
        created_at: agent_created_at,
        received_at: Utc::now(),
        payload,
        triggered: false,
        triggered_reason: None,
    };

    // 4. APPEND DURABLE (commit-before-evaluate).
    let sample_row_id = state.timeseries_repository.append(&sample).await?;

    // 5. VIVACIDAD: escritura condicional de last_seen_at.
    if let Err(liveness_fault) = state
        .agent_repository
        .bump_liveness(session.workspace_id, session.agent_id, None)
        .await
    {
        // La vivacidad es best-effort: el append ya es un hecho.
        error!("⚠️ [LIVENESS_FAULT]: Agent {} last_seen bump failed: {}",
            session.agent_id, liveness_fault);
    }

    // 6. EVALUACIÓN: los fallos se registran sin revertir el append.
    let evaluation = alerting::evaluate_sample(state, &probe, &sample).await;

    let published_sample = if evaluation.any_triggered() {
        let reason = evaluation.triggered_reasons.join("; ");
        if let Err(mark_fault) = state.timeseries_repository.mark_triggered(sample_row_id, &reason).await {
            error!("⚠️ [TRIGGER_MARK_FAULT]: Sample {} flag lost: {}", sample_row_id, mark_fault);
        }
        ProbeSample {
            triggered: true,
            triggered_reason: Some(reason),
            ..sample
        }
    } else {
        sample
    };

    // 7. PUBLICACIÓN en los tópicos (sonda, agente). Best-effort.
    state
        .subscription_hub
        .publish_sample(session.workspace_id, &published_sample);

    debug!("📥 [INGEST_COMPLETE]: Probe {} sample durable and broadcast.", probe_id);
    Ok(published_sample)
}
