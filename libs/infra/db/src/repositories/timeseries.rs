// [libs/infra/db/src/repositories/timeseries.rs]
/*!
 * =================================================================
 * APARATO: TIME SERIES ADAPTER (V4.2 - BUCKET GRID)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3/C4)
 * RESPONSABILIDAD: APPEND DURABLE, RANGOS Y AGREGACIÓN POR CUBETAS
 *
 * # Mathematical Proof (Conservative Rollups):
 * La agregación PING pondera la pérdida por paquetes enviados: la suma de
 * packetsSent sobre las cubetas de un rango es idéntica a la suma sobre
 * las filas crudas del mismo rango. El rollup jamás inventa ni descarta
 * tráfico. MTR y SYSINFO nunca se agregan en el servidor.
 *
 * La rejilla de cubetas apunta a ~500 puntos por consulta:
 * cubeta = menor valor de la escalera {10,30,60,120,300,600,1800,3600,
 * 7200,14400,21600} mayor o igual a rango/500; rangos <= 60 s van crudos.
 * =================================================================
 */

use crate::errors::DbError;
use crate::DbClient;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{params, Row};
use netwatcher_domain_models::probe::ProbeType;
use netwatcher_domain_models::sample::{ProbeSample, SamplePayload};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Escalera de cubetas admitidas, en segundos.
const BUCKET_LADDER_SECONDS: &[i64] = &[10, 30, 60, 120, 300, 600, 1800, 3600, 7200, 14400, 21600];

/// Puntos objetivo por consulta agregada.
const TARGET_POINTS_PER_QUERY: i64 = 500;

/// Nanosegundos por milisegundo (normalización de RTT crudos de PING).
const NANOSECONDS_PER_MILLISECOND: f64 = 1_000_000.0;

/**
 * Selecciona la cubeta para un rango temporal.
 *
 * Retorna `None` para rangos que se sirven crudos (<= 60 s).
 */
pub fn choose_bucket_seconds(range_seconds: i64) -> Option<i64> {
    if range_seconds <= 60 {
        return None;
    }

    let ideal_bucket = (range_seconds + TARGET_POINTS_PER_QUERY - 1) / TARGET_POINTS_PER_QUERY;

    Some(
        BUCKET_LADDER_SECONDS
            .iter()
            .copied()
            .find(|bucket| *bucket >= ideal_bucket)
            .unwrap_or(*BUCKET_LADDER_SECONDS.last().expect("ladder is non-empty")),
    )
}

/// Fila agregada de PING sobre la rejilla de cubetas (RTT en milisegundos).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PingBucket {
    /// Inicio de la cubeta: floor(created_at / bucket) * bucket, epoch-seconds.
    pub bucket: i64,
    pub count: i64,
    #[serde(rename = "avgLatency")]
    pub avg_latency: f64,
    #[serde(rename = "minLatency")]
    pub min_latency: f64,
    #[serde(rename = "maxLatency")]
    pub max_latency: f64,
    #[serde(rename = "packetsSent")]
    pub packets_sent: i64,
    #[serde(rename = "packetsRecv")]
    pub packets_recv: i64,
    #[serde(rename = "packetLoss")]
    pub packet_loss: f64,
}

/// Fila agregada de TRAFFICSIM sobre la rejilla de cubetas.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrafficSimBucket {
    pub bucket: i64,
    pub count: i64,
    #[serde(rename = "averageRTT")]
    pub average_rtt: f64,
    #[serde(rename = "minRTT")]
    pub min_rtt: f64,
    #[serde(rename = "maxRTT")]
    pub max_rtt: f64,
    #[serde(rename = "lostPackets")]
    pub lost_packets: i64,
    #[serde(rename = "totalPackets")]
    pub total_packets: i64,
    #[serde(rename = "lossPercentage")]
    pub loss_percentage: f64,
}

/// Resultado polimórfico de una consulta histórica de visor.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SeriesQueryResult {
    Raw(Vec<ProbeSample>),
    PingBuckets(Vec<PingBucket>),
    TrafficSimBuckets(Vec<TrafficSimBucket>),
}

/// Adaptador de autoridad única sobre la serie temporal de mediciones.
pub struct TimeSeriesRepository {
    database_client: DbClient,
}

impl TimeSeriesRepository {
    pub fn new(client: DbClient) -> Self {
        Self { database_client: client }
    }

    /**
     * Append durable de una medición. Retorna el identificador de fila una
     * vez comprometido: el evaluador jamás observa una muestra no durable.
     */
    #[instrument(skip(self, sample), fields(probe = sample.probe_id, probe_type = sample.probe_type.as_str()))]
    pub async fn append(&self, sample: &ProbeSample) -> Result<i64, DbError> {
        let connection = self.database_client.get_connection()?;

        let payload_json = serde_json::to_string(&sample.payload.to_json())
            .map_err(|fault| DbError::MappingError(format!("PAYLOAD_SERIALIZATION: {}", fault)))?;

        let mut rows = connection
            .query(
                "INSERT INTO probe_samples (probe_id, agent_id, type, created_at, received_at,
                                            payload_json, triggered, triggered_reason)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 RETURNING id",
                params![
                    sample.probe_id,
                    sample.agent_id,
                    sample.probe_type.as_str(),
                    format_series_timestamp(sample.created_at),
                    format_series_timestamp(sample.received_at),
                    payload_json,
                    sample.triggered as i64,
                    sample.triggered_reason.clone()
                ],
            )
            .await?;

        rows.next()
            .await?
            .ok_or(DbError::TransactionError)?
            .get::<i64>(0)
            .map_err(DbError::QueryError)
    }

    /// Marca una fila como disparadora tras la evaluación de reglas.
    pub async fn mark_triggered(&self, sample_row_id: i64, reason: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "UPDATE probe_samples SET triggered = 1, triggered_reason = ?2 WHERE id = ?1",
                params![sample_row_id, reason],
            )
            .await?;
        Ok(())
    }

    /**
     * Muestras crudas en orden de recencia (más nuevas primero).
     *
     * Un rango de longitud cero o negativa retorna vacío sin error.
     */
    #[instrument(skip(self), fields(probe = probe_id))]
    pub async fn range(
        &self,
        probe_id: i64,
        probe_type: ProbeType,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ProbeSample>, DbError> {
        if from >= to {
            return Ok(Vec::new());
        }

        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT probe_id, agent_id, type, created_at, received_at, payload_json,
                        triggered, triggered_reason
                 FROM probe_samples
                 WHERE probe_id = ?1 AND type = ?2 AND created_at >= ?3 AND created_at < ?4
                 ORDER BY created_at DESC
                 LIMIT ?5",
                params![
                    probe_id,
                    probe_type.as_str(),
                    format_series_timestamp(from),
                    format_series_timestamp(to),
                    limit
                ],
            )
            .await?;

        let mut samples = Vec::new();
        while let Some(row) = rows.next().await? {
            samples.push(map_row_to_sample(row)?);
        }
        Ok(samples)
    }

    /**
     * Rollups PING por cubeta. Ponderación conservadora: packetsSent y
     * packetsRecv se suman; packetLoss se deriva de esas sumas.
     */
    #[instrument(skip(self), fields(probe = probe_id, bucket = bucket_seconds))]
    pub async fn aggregate_ping(
        &self,
        probe_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        bucket_seconds: i64,
    ) -> Result<Vec<PingBucket>, DbError> {
        if from >= to {
            return Ok(Vec::new());
        }

        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT (CAST(strftime('%s', created_at) AS INTEGER) / ?4) * ?4 AS bucket_start,
                        COUNT(*),
                        AVG(CAST(json_extract(payload_json, '$.avg_rtt') AS REAL)),
                        MIN(CAST(json_extract(payload_json, '$.min_rtt') AS REAL)),
                        MAX(CAST(json_extract(payload_json, '$.max_rtt') AS REAL)),
                        SUM(CAST(json_extract(payload_json, '$.packets_sent') AS INTEGER)),
                        SUM(CAST(json_extract(payload_json, '$.packets_recv') AS INTEGER))
                 FROM probe_samples
                 WHERE probe_id = ?1 AND type = 'PING' AND created_at >= ?2 AND created_at < ?3
                 GROUP BY bucket_start
                 ORDER BY bucket_start ASC",
                params![
                    probe_id,
                    format_series_timestamp(from),
                    format_series_timestamp(to),
                    bucket_seconds
                ],
            )
            .await?;

        let mut buckets = Vec::new();
        while let Some(row) = rows.next().await? {
            let packets_sent: i64 = row.get(5)?;
            let packets_recv: i64 = row.get(6)?;
            let packet_loss = if packets_sent > 0 {
                100.0 * (packets_sent - packets_recv) as f64 / packets_sent as f64
            } else {
                0.0
            };

            buckets.push(PingBucket {
                bucket: row.get(0)?,
                count: row.get(1)?,
                avg_latency: row.get::<f64>(2)? / NANOSECONDS_PER_MILLISECOND,
                min_latency: row.get::<f64>(3)? / NANOSECONDS_PER_MILLISECOND,
                max_latency: row.get::<f64>(4)? / NANOSECONDS_PER_MILLISECOND,
                packets_sent,
                packets_recv,
                packet_loss,
            });
        }

        debug!("📊 [SERIES_ROLLUP]: {} PING buckets materialized for probe {}.", buckets.len(), probe_id);
        Ok(buckets)
    }

    /**
     * Rollups TRAFFICSIM por cubeta: promedio de RTT, extremos y paquetes
     * perdidos/totales sumados.
     */
    #[instrument(skip(self), fields(probe = probe_id, bucket = bucket_seconds))]
    pub async fn aggregate_trafficsim(
        &self,
        probe_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        bucket_seconds: i64,
    ) -> Result<Vec<TrafficSimBucket>, DbError> {
        if from >= to {
            return Ok(Vec::new());
        }

        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT (CAST(strftime('%s', created_at) AS INTEGER) / ?4) * ?4 AS bucket_start,
                        COUNT(*),
                        AVG(CAST(json_extract(payload_json, '$.averageRTT') AS REAL)),
                        MIN(CAST(json_extract(payload_json, '$.minRTT') AS REAL)),
                        MAX(CAST(json_extract(payload_json, '$.maxRTT') AS REAL)),
                        SUM(CAST(json_extract(payload_json, '$.lostPackets') AS INTEGER)),
                        SUM(CAST(json_extract(payload_json, '$.totalPackets') AS INTEGER))
                 FROM probe_samples
                 WHERE probe_id = ?1 AND type = 'TRAFFICSIM' AND created_at >= ?2 AND created_at < ?3
                 GROUP BY bucket_start
                 ORDER BY bucket_start ASC",
                params![
                    probe_id,
                    format_series_timestamp(from),
                    format_series_timestamp(to),
                    bucket_seconds
                ],
            )
            .await?;

        let mut buckets = Vec::new();
        while let Some(row) = rows.next().await? {
            let lost_packets: i64 = row.get(5)?;
            let total_packets: i64 = row.get(6)?;
            let loss_percentage = if total_packets > 0 {
                100.0 * lost_packets as f64 / total_packets as f64
            } else {
                0.0
            };

            buckets.push(TrafficSimBucket {
                bucket: row.get(0)?,
                count: row.get(1)?,
                average_rtt: row.get(2)?,
                min_rtt: row.get(3)?,
                max_rtt: row.get(4)?,
                lost_packets,
                total_packets,
                loss_percentage,
            });
        }
        Ok(buckets)
    }
}

/// Formato canónico de marcas temporales en la serie: milisegundos con
/// sufijo explícito `+00:00` (la forma que `strftime` de SQLite interpreta).
/// La comparación lexicográfica de este formato es cronológica.
fn format_series_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, false)
}

fn map_row_to_sample(row: Row) -> Result<ProbeSample, DbError> {
    let type_raw: String = row.get(2)?;
    let probe_type = ProbeType::parse(&type_raw)
        .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_PROBE_TYPE: {}", type_raw)))?;

    let payload_raw: String = row.get(5)?;
    let payload_value: serde_json::Value = serde_json::from_str(&payload_raw)
        .map_err(|fault| DbError::MappingError(format!("PAYLOAD_DRIFT: {}", fault)))?;
    let payload = SamplePayload::parse(probe_type, payload_value)
        .map_err(|fault| DbError::MappingError(fault.to_string()))?;

    Ok(ProbeSample {
        probe_id: row.get(0)?,
        agent_id: row.get(1)?,
        probe_type,
        created_at: crate::repositories::parse_timestamp(&row.get::<String>(3)?)?,
        received_at: crate::repositories::parse_timestamp(&row.get::<String>(4)?)?,
        payload,
        triggered: row.get::<i64>(6)? != 0,
        triggered_reason: row.get::<Option<String>>(7)?,
    })
}
