// [libs/domain/models/src/stream.rs]
/*!
 * =================================================================
 * APARATO: LIVE STREAM CONTRACTS (V2.2 - TOPIC GRAMMAR)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: GRAMÁTICA DE TÓPICOS Y TRAMAS DEL HUB DE SUSCRIPCIÓN
 *
 * # Logic:
 * Gramática de tópicos: `agent:<workspace_id>:<agent_id>` (todo el flujo de
 * un agente) y `probe:<probe_id>` (una sonda). La autorización se aplica en
 * el momento de la suscripción, nunca por trama.
 * =================================================================
 */

use crate::sample::ProbeSample;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use std::fmt;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TopicParseError {
    #[error("[L2_TOPIC_FAULT]: UNKNOWN_TOPIC_SHAPE -> {0}")]
    UnknownShape(String),

    #[error("[L2_TOPIC_FAULT]: NON_NUMERIC_SEGMENT -> {0}")]
    NonNumericSegment(String),
}

/// Llave de suscripción del hub en tiempo real.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Todo el flujo de mediciones de un agente.
    Agent { workspace_id: i64, agent_id: i64 },
    /// El flujo de una sonda concreta.
    Probe { probe_id: i64 },
}

impl Topic {
    /**
     * Interpreta la forma textual de un tópico.
     *
     * # Errors:
     * - `TopicParseError::UnknownShape`: Prefijo o aridad desconocidos.
     * - `TopicParseError::NonNumericSegment`: Identificadores no numéricos.
     */
    pub fn parse(raw_topic: &str) -> Result<Self, TopicParseError> {
        let segments: Vec<&str> = raw_topic.split(':').collect();

        let parse_segment = |segment: &str| {
            segment
                .parse::<i64>()
                .map_err(|_| TopicParseError::NonNumericSegment(raw_topic.to_string()))
        };

        match segments.as_slice() {
            ["agent", workspace_segment, agent_segment] => Ok(Topic::Agent {
                workspace_id: parse_segment(workspace_segment)?,
                agent_id: parse_segment(agent_segment)?,
            }),
            ["probe", probe_segment] => Ok(Topic::Probe {
                probe_id: parse_segment(probe_segment)?,
            }),
            _ => Err(TopicParseError::UnknownShape(raw_topic.to_string())),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Agent { workspace_id, agent_id } => {
                write!(formatter, "agent:{}:{}", workspace_id, agent_id)
            }
            Topic::Probe { probe_id } => write!(formatter, "probe:{}", probe_id),
        }
    }
}

/// Trama entrante de un visor: suscripción o desuscripción a tópicos.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "action")]
pub enum ViewerCommandFrame {
    Subscribe { topics: Vec<String> },
    Unsubscribe { topics: Vec<String> },
}

/// Trama saliente hacia un visor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "frame")]
pub enum ViewerDataFrame {
    /// Confirmación de suscripción aceptada.
    Subscribed { topics: Vec<String> },
    /// Una medición ingerida publicada en un tópico suscrito.
    Data {
        topic: String,
        sample: ProbeSample,
    },
    /// Transición de ciclo de vida de una alerta (canal de panel implícito).
    Alert {
        topic: String,
        alert: crate::alert::Alert,
    },
    /// Rechazo de autorización o de gramática en la suscripción.
    Error { detail: String },
}
