// [tests/mirror/apps/controller/services/subscription_hub.test.rs]
/**
 * =================================================================
 * APARATO: SUBSCRIPTION HUB TEST (V5.0 - FAN-OUT CONTRACT)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: FIFO POR TÓPICO, BACKPRESSURE Y EVICCIÓN
 * =================================================================
 */

use chrono::{Duration, Utc};
use netwatcher_controller::services::hub::SubscriptionHub;
use netwatcher_domain_models::probe::ProbeType;
use netwatcher_domain_models::sample::{ProbeSample, SamplePayload};
use netwatcher_domain_models::stream::{Topic, ViewerDataFrame};
use serde_json::json;

fn sample_at(probe_id: i64, agent_id: i64, offset_seconds: i64) -> ProbeSample {
    let created_at = Utc::now() + Duration::seconds(offset_seconds);
    let payload = SamplePayload::parse(
        ProbeType::Ping,
        json!({
            "start_timestamp": created_at,
            "stop_timestamp": created_at,
            "packets_sent": 10, "packets_recv": 10, "packet_loss": 0.0,
            "min_rtt": 9_000_000.0, "avg_rtt": 10_000_000.0,
            "max_rtt": 12_000_000.0, "std_dev_rtt": 500_000.0,
            "addr": "1.1.1.1"
        }),
    )
    .unwrap();

    ProbeSample {
        probe_id,
        agent_id,
        probe_type: ProbeType::Ping,
        created_at,
        received_at: created_at,
        payload,
        triggered: false,
        triggered_reason: None,
    }
}

#[tokio::test]
async fn certify_topic_fanout_and_fifo_order() {
    println!("\n📻 [PROVING_GROUNDS]: Auditing hub fan-out contract...");

    let hub = SubscriptionHub::new();

    // Visor A: tópico de sonda. Visor B: tópico de agente.
    let (session_a, sender_a, mut receiver_a) = hub.open_session();
    hub.subscribe(session_a, Topic::Probe { probe_id: 7 }, sender_a);

    let (session_b, sender_b, mut receiver_b) = hub.open_session();
    hub.subscribe(session_b, Topic::Agent { workspace_id: 1, agent_id: 3 }, sender_b);

    // Ráfaga ordenada de tres muestras.
    for offset in 0..3 {
        hub.publish_sample(1, &sample_at(7, 3, offset));
    }

    // FIFO por tópico por visor: las marcas de tiempo llegan crecientes.
    let mut received_timestamps = Vec::new();
    for _ in 0..3 {
        let frame = receiver_a.recv().await.expect("Probe-topic frame expected.");
        let ViewerDataFrame::Data { topic, sample } = frame else {
            panic!("INTEGRITY_FAULT: Unexpected frame variant.");
        };
        assert_eq!(topic, "probe:7");
        received_timestamps.push(sample.created_at);
    }
    assert!(received_timestamps.windows(2).all(|pair| pair[0] < pair[1]),
        "Frames must preserve publication order per topic.");

    // El tópico de agente recibió la misma ráfaga.
    let mut agent_frames = 0;
    while let Ok(frame) = receiver_b.try_recv() {
        let ViewerDataFrame::Data { topic, .. } = frame else { continue };
        assert_eq!(topic, "agent:1:3");
        agent_frames += 1;
    }
    assert_eq!(agent_frames, 3);

    // Una sonda ajena no filtra hacia los suscriptores.
    hub.publish_sample(1, &sample_at(99, 55, 0));
    assert!(receiver_a.try_recv().is_err(), "Foreign probe must not leak.");

    println!("   ✅ [SUCCESS]: Fan-out and FIFO certified.");
}

#[tokio::test]
async fn certify_slow_viewer_drops_do_not_block() {
    let hub = SubscriptionHub::new();

    // Visor lento: su cola (256) jamás se drena.
    let (slow_session, slow_sender, _stalled_receiver) = hub.open_session();
    hub.subscribe(slow_session, Topic::Probe { probe_id: 7 }, slow_sender);

    assert_eq!(hub.backpressure_drops(), 0);

    // 300 publicaciones contra una cola de 256: el excedente se descarta.
    for offset in 0..300 {
        hub.publish_sample(1, &sample_at(7, 3, offset));
    }

    assert!(hub.backpressure_drops() >= 44,
        "Overflow must be dropped and counted, observed {}", hub.backpressure_drops());
    assert_eq!(hub.subscriber_count(Topic::Probe { probe_id: 7 }), 1,
        "A slow viewer is degraded, never evicted for slowness.");
}

#[tokio::test]
async fn certify_eviction_within_publish_cycle() {
    let hub = SubscriptionHub::new();

    let (session, sender, receiver) = hub.open_session();
    hub.subscribe(session, Topic::Probe { probe_id: 7 }, sender.clone());
    hub.subscribe(session, Topic::Agent { workspace_id: 1, agent_id: 3 }, sender);

    assert_eq!(hub.subscriber_count(Topic::Probe { probe_id: 7 }), 1);

    // Desconexión: el receptor muere y la siguiente publicación expulsa la
    // sesión de TODOS sus tópicos dentro del mismo ciclo.
    drop(receiver);
    hub.publish_sample(1, &sample_at(7, 3, 0));

    assert_eq!(hub.subscriber_count(Topic::Probe { probe_id: 7 }), 0,
        "A severed session must be evicted within one publish cycle.");
    assert_eq!(hub.subscriber_count(Topic::Agent { workspace_id: 1, agent_id: 3 }), 0);

    // La desuscripción explícita de una sesión viva es quirúrgica.
    let (second_session, second_sender, _second_receiver) = hub.open_session();
    hub.subscribe(second_session, Topic::Probe { probe_id: 8 }, second_sender.clone());
    hub.subscribe(second_session, Topic::Probe { probe_id: 9 }, second_sender);

    hub.unsubscribe(second_session, Topic::Probe { probe_id: 8 });
    assert_eq!(hub.subscriber_count(Topic::Probe { probe_id: 8 }), 0);
    assert_eq!(hub.subscriber_count(Topic::Probe { probe_id: 9 }), 1);
}
