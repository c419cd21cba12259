// [libs/domain/evaluator/src/fingerprint.rs]
/*!
 * =================================================================
 * APARATO: ROUTE FINGERPRINT ENGINE (V1.4 - CANONICAL HOPS)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: HUELLA ESTABLE DE RUTAS MTR PARA DETECCIÓN DE CAMBIO
 *
 * # Mathematical Proof (Fingerprint Stability):
 * Cada salto se canonicaliza al menor lexicográfico de sus IPs observadas
 * antes del hash. Reordenar los hosts dentro de un salto no altera la
 * huella; reordenar los saltos sí. Los saltos sin respuesta contribuyen
 * el símbolo '*'. La huella es el prefijo de 16 hex del SHA-256 de
 * `ip[0]->ip[1]->...`, suficiente contra colisiones accidentales en el
 * espacio de rutas de un workspace.
 * =================================================================
 */

use netwatcher_domain_models::sample::{MtrHop, MtrReport};
use sha2::{Digest, Sha256};

/// Longitud del prefijo hexadecimal conservado de la huella SHA-256.
const FINGERPRINT_HEX_LENGTH: usize = 16;

/// Huella calculada de una ruta MTR, con su forma legible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteFingerprint {
    /// Prefijo hexadecimal del SHA-256 del camino canónico.
    pub fingerprint: String,
    /// Camino legible `ip[0] -> ip[1] -> ...` para el panel.
    pub path_human: String,
    /// Cantidad de saltos del reporte.
    pub hop_count: usize,
}

/// Calcula la huella de ruta de un reporte MTR.
///
/// Se invoca en cada muestra MTR, exista o no una regla `route_change`:
/// el baseline debe seguir a la realidad.
pub fn compute_route_fingerprint(report: &MtrReport) -> RouteFingerprint {
    let canonical_hop_ips: Vec<String> =
        report.hops.iter().map(canonical_hop_address).collect();

    let canonical_path = canonical_hop_ips.join("->");
    let path_human = canonical_hop_ips.join(" -> ");

    let mut hasher = Sha256::new();
    hasher.update(canonical_path.as_bytes());
    let digest = hasher.finalize();

    let mut fingerprint = hex::encode(digest);
    fingerprint.truncate(FINGERPRINT_HEX_LENGTH);

    RouteFingerprint {
        fingerprint,
        path_human,
        hop_count: report.hops.len(),
    }
}

/// IP canónica de un salto: el menor lexicográfico de sus hosts con IP
/// no vacía; '*' cuando el salto no respondió.
fn canonical_hop_address(hop: &MtrHop) -> String {
    hop.hosts
        .iter()
        .map(|host| host.ip.trim())
        .filter(|ip| !ip.is_empty() && *ip != "*")
        .min()
        .map(str::to_string)
        .unwrap_or_else(|| "*".to_string())
}
