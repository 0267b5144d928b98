use criterion::{criterion_group, criterion_main, Criterion};
use snmpsim_core::{
    snmp::{Message, Pdu, PduType, VarBind, VarValue, Version},
    Agent, Oid, Responder, Sim, Value, ValueStore,
};
use std::{net::Ipv4Addr, sync::Arc, time::Duration};
use tokio::{net::UdpSocket, runtime::Runtime};

fn agent() -> Agent {
    let oids: Vec<Oid> = (0..100u32).map(|i| Oid::from([1, 3, 6, 1, 4, 1, 99, i])).collect();
    let store = Arc::new(ValueStore::new(oids.iter().cloned()));
    for (i, oid) in oids.iter().enumerate() {
        store.set(oid, Value::Integer(i as i64)).unwrap();
    }
    let mut agent = Agent::new(store);
    for oid in oids {
        agent.register_read_only(oid).unwrap();
    }
    agent
}

fn request(kind: PduType, error_status: i64, error_index: i64) -> Vec<u8> {
    Message {
        version: Version::V2c,
        community: b"public".to_vec(),
        pdu: Pdu {
            kind,
            request_id: 1,
            error_status,
            error_index,
            varbinds: vec![VarBind::new(Oid::from([1, 3, 6, 1, 4, 1, 99, 7]), VarValue::Null)],
        },
    }
    .encode()
    .unwrap()
}

fn criterion_benchmark(c: &mut Criterion) {
    let agent = agent();
    let get = request(PduType::GetRequest, 0, 0);
    let bulk = request(PduType::GetBulkRequest, 0, 50);
    c.bench_function("GetRequest round trip", |b| {
        b.iter(|| agent.process_datagram(&get).unwrap())
    });
    c.bench_function("GetBulkRequest x50", |b| {
        b.iter(|| agent.process_datagram(&bulk).unwrap())
    });
}

/// The full path through the responder: one GET over a loopback socket.
fn responder_benchmark(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let (sim, socket) = runtime.block_on(async {
        let mut sim = Sim::new();
        let responder = Responder::bind(
            (Ipv4Addr::LOCALHOST, 0).into(),
            agent(),
            Duration::from_millis(100),
            sim.get_shutdown(),
        )
        .await
        .unwrap();
        let address = responder.local_addr().unwrap();
        sim.start_responder(responder);

        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        socket.connect(address).await.unwrap();
        (sim, socket)
    });

    let get = request(PduType::GetRequest, 0, 0);
    let (socket, get) = (&socket, &get);
    c.bench_function("GetRequest over UDP", |b| {
        b.to_async(&runtime).iter(|| async move {
            socket.send(get).await.unwrap();
            let mut buffer = [0u8; 512];
            socket.recv(&mut buffer).await.unwrap()
        })
    });

    sim.get_shutdown().shut_down();
    runtime.block_on(sim.wait()).unwrap();
}

criterion_group!(benches, criterion_benchmark, responder_benchmark);
criterion_main!(benches);
