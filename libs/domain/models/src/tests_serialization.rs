// [libs/domain/models/src/tests_serialization.rs]
/**
 * =================================================================
 * APARATO: DOMAIN SERIALIZATION TEST (V4.1 - INTEGRATION LEVEL)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L2-MODELS)
 * RESPONSABILIDAD: CERTIFICACIÓN DE PARIDAD JSON DE PAYLOADS Y TÓPICOS
 *
 * # Logic:
 * Valida que los contratos heterogéneos del agente (PING, MTR, TRAFFICSIM,
 * SYSINFO) se interpreten según el tipo de sonda declarado, que los tipos
 * desconocidos se rechacen en la frontera, y que la gramática de tópicos
 * del hub sea estable en ambas direcciones.
 * =================================================================
 */
