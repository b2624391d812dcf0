//! # Envelope Pipeline Benchmarks
//!
//! Cost of sealing and opening one envelope:
//!
//! | Path | Work |
//! |------|------|
//! | seal/plain | encode body, Ed25519 sign, encode envelope |
//! | seal/encrypted | + X25519 key wrap, XChaCha20-Poly1305 |
//! | open/plain | decode, Ed25519 verify, decode body |
//! | open/encrypted | + unwrap, decrypt |

use agent_crypto::{AgentKeys, CryptoProvider, InMemoryKeyStore};
use agent_runtime::EnvelopePipeline;
use agent_types::{current_timestamp_millis, AgentId, AgentMessage, EnvelopeHeader, MissionRequest};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use sdk_01_envelope_codec::EnvelopeCodecService;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const AGENT: &str = "bench-agent";

/// Agent and orchestrator pipelines that know each other's keys.
fn pipelines() -> (EnvelopePipeline, EnvelopePipeline) {
    let agent_keys = AgentKeys::generate();
    let orchestrator_keys = AgentKeys::generate();

    let agent_store = Arc::new(InMemoryKeyStore::new());
    agent_store.install_public(AgentId::orchestrator(), orchestrator_keys.public_bundle());
    let orchestrator_store = Arc::new(InMemoryKeyStore::new());
    orchestrator_store.install_public(AgentId::new(AGENT), agent_keys.public_bundle());

    agent_store.insert_private(AgentId::new(AGENT), agent_keys);
    orchestrator_store.insert_private(AgentId::orchestrator(), orchestrator_keys);

    let agent = EnvelopePipeline::new(
        EnvelopeCodecService::default(),
        CryptoProvider::new(AgentId::new(AGENT), agent_store),
    );
    let orchestrator = EnvelopePipeline::new(
        EnvelopeCodecService::default(),
        CryptoProvider::new(AgentId::orchestrator(), orchestrator_store),
    );
    (agent, orchestrator)
}

fn header(encrypted: bool) -> EnvelopeHeader {
    EnvelopeHeader {
        sender_id: AgentId::new(AGENT),
        recipient_id: AgentId::orchestrator(),
        message_type: String::new(),
        sequence_number: 1,
        timestamp: current_timestamp_millis(),
        session_token: Some("bench".into()),
        correlation_id: Uuid::new_v4(),
        reply_to: None,
        encrypted,
    }
}

/// Mission request carrying `size` bytes of hex payload.
fn message(size: usize) -> AgentMessage {
    let mut rng = rand::thread_rng();
    let blob: Vec<u8> = (0..size / 2).map(|_| rng.gen()).collect();
    AgentMessage::MissionRequest(MissionRequest {
        work_process_type: "transport".into(),
        data: json!({ "blob": hex::encode(blob) }),
    })
}

fn bench_seal(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope/seal");
    group.measurement_time(Duration::from_secs(5));
    let (agent, _) = pipelines();

    for size in [256usize, 4 * 1024, 64 * 1024] {
        let msg = message(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("plain", size), &msg, |b, msg| {
            b.iter(|| black_box(agent.seal(header(false), msg).is_ok()))
        });
        group.bench_with_input(BenchmarkId::new("encrypted", size), &msg, |b, msg| {
            b.iter(|| black_box(agent.seal(header(true), msg).is_ok()))
        });
    }
    group.finish();
}

fn bench_open(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope/open");
    group.measurement_time(Duration::from_secs(5));
    let (agent, orchestrator) = pipelines();

    for size in [256usize, 4 * 1024, 64 * 1024] {
        let msg = message(size);
        let plain = agent.seal(header(false), &msg).expect("seal plain");
        let sealed = agent.seal(header(true), &msg).expect("seal encrypted");

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("plain", size), &plain, |b, bytes| {
            b.iter(|| black_box(orchestrator.open(bytes).is_ok()))
        });
        group.bench_with_input(BenchmarkId::new("encrypted", size), &sealed, |b, bytes| {
            b.iter(|| black_box(orchestrator.open(bytes).is_ok()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_seal, bench_open);
criterion_main!(benches);
