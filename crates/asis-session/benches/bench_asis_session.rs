use asis_core::clock::{Clock, ManualClock};
use asis_core::types::{Message, Role, SessionId};
use asis_session::ring::RingStore;
use asis_session::ttl::TtlStore;
use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

fn bench_ring_append(c: &mut Criterion) {
    c.bench_function("ring_append_1000_one_session", |b| {
        b.iter(|| {
            let ring = RingStore::default();
            let s = SessionId::from("bench");
            for i in 0..1000 {
                ring.append(&s, Message::new(Role::User, format!("message {i}"), false, Utc::now()));
            }
            black_box(ring.fetch(&s, 20));
        })
    });

    c.bench_function("ring_append_1000_sessions", |b| {
        b.iter(|| {
            let ring = RingStore::default();
            for i in 0..1000 {
                let s = SessionId::new(format!("user_{i}"));
                ring.append(&s, Message::new(Role::User, "hello", false, Utc::now()));
            }
            black_box(ring.session_count());
        })
    });
}

fn bench_ttl_sweep(c: &mut Criterion) {
    c.bench_function("ttl_sweep_1000_sessions", |b| {
        b.iter(|| {
            let clock = Arc::new(ManualClock::starting_now());
            let ttl = TtlStore::new(Duration::hours(24), clock.clone());
            for i in 0..1000 {
                if i == 500 {
                    clock.advance(Duration::hours(12));
                }
                let s = SessionId::new(format!("user_{i}"));
                ttl.append(&s, Message::new(Role::User, "hello", false, Utc::now())).unwrap();
            }
            clock.advance(Duration::hours(12));
            black_box(ttl.sweep(clock.now()));
        })
    });
}

criterion_group!(benches, bench_ring_append, bench_ttl_sweep);
criterion_main!(benches);
