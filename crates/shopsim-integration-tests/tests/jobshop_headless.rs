//! End-to-end job-shop runs exercising release policies, routing, and the
//! completed-job archive through the public engine API only.
//!
//! Timings in these tests are exact: all samples are constant, so every
//! assertion is against a hand-computed schedule.

use std::cell::RefCell;
use std::rc::Rc;

use shopsim_core::builder::ShopBuilder;
use shopsim_core::event::EventKind;
use shopsim_core::fixed::Fixed64;
use shopsim_core::job::DueDateBand;
use shopsim_core::policies::{ReleasePolicy, ScoreWeights, WipStrategy};
use shopsim_core::rng::Sample;
use shopsim_core::server::{Server, ServerKind};
use shopsim_core::id::ServerId;
use shopsim_core::test_utils::*;
use slotmap::SecondaryMap;

fn norms(entries: &[(ServerId, f64)]) -> SecondaryMap<ServerId, Fixed64> {
    let mut map = SecondaryMap::new();
    for &(server, norm) in entries {
        map.insert(server, Fixed64::from_num(norm));
    }
    map
}

#[test]
fn flow_shop_routes_in_order() {
    let (mut engine, servers) = flow_shop(3);
    let route = [(servers[0], 2.0), (servers[1], 3.0), (servers[2], 1.0)];
    let job = engine.submit(routed_job(&route, 20.0)).unwrap();

    let finishes = finish_times(&mut engine, 100.0);
    assert_eq!(finishes, vec![fixed(6.0)]);

    let record = engine.job(job).unwrap();
    assert_eq!(record.op_log.len(), 3);
    assert!(record.is_done());

    // Finished 14 before the due date with a default window of 7: early.
    let completed = &engine.completed()[0];
    assert_eq!(completed.lateness, fixed(-14.0));
    assert_eq!(completed.band, DueDateBand::Early);
}

#[test]
fn two_jobs_pipeline_through_a_capacity_one_chain() {
    let (mut engine, servers) = flow_shop(2);
    let route = [(servers[0], 2.0), (servers[1], 2.0)];
    engine.submit(routed_job(&route, 50.0)).unwrap();
    engine.submit(routed_job(&route, 50.0)).unwrap();

    // A: m0 0-2, m1 2-4. B: m0 2-4, m1 4-6.
    assert_eq!(finish_times(&mut engine, 100.0), vec![fixed(4.0), fixed(6.0)]);
}

#[test]
fn workload_norm_gates_then_starvation_pulls() {
    let mut builder = ShopBuilder::new();
    let m1 = builder.add_server(Server::new("m1", 1, ServerKind::Standard));
    let builder = builder.release_policy(ReleasePolicy::WorkloadNorm {
        norms: norms(&[(m1, 4.0)]),
        allowance: fixed(0.0),
        check_interval: fixed(4.0),
    });
    let mut builder = builder;
    builder.schedule_arrival(fixed(0.0), simple_job(m1, 4.0, 50.0));
    builder.schedule_arrival(fixed(0.0), simple_job(m1, 4.0, 60.0));
    let mut engine = builder.build_or_panic();

    engine.run(fixed(100.0)).unwrap();

    // The first periodic check at t=4 admits one job (norm 4 fits exactly
    // one charge of 4). Its completion at t=8 leaves the server starving,
    // and the continuous trigger pulls the second job past the norm.
    let mut released: Vec<Fixed64> = engine
        .completed()
        .iter()
        .map(|c| c.released_at)
        .collect();
    released.sort();
    assert_eq!(released, vec![fixed(4.0), fixed(8.0)]);

    let finishes: Vec<Fixed64> = engine.completed().iter().map(|c| c.finished_at).collect();
    assert_eq!(finishes, vec![fixed(8.0), fixed(12.0)]);
    assert_eq!(engine.pool_len(), 0);
}

#[test]
fn corrected_wip_admits_where_standard_blocks() {
    // Route m0 then m1, 6 time units each. Corrected accounting charges m1
    // only 6/2 = 3 at release; standard charges the full 6.
    let run_with = |strategy: WipStrategy| {
        let mut builder = ShopBuilder::new();
        let m0 = builder.add_server(Server::new("m0", 1, ServerKind::Standard));
        let m1 = builder.add_server(Server::new("m1", 1, ServerKind::Standard));
        let mut builder = builder.wip_strategy(strategy).release_policy(
            ReleasePolicy::WorkloadNorm {
                norms: norms(&[(m0, 6.0), (m1, 3.0)]),
                allowance: fixed(0.0),
                check_interval: fixed(4.0),
            },
        );
        builder.schedule_arrival(fixed(0.0), routed_job(&[(m0, 6.0), (m1, 6.0)], 100.0));
        let mut engine = builder.build_or_panic();
        engine.run(fixed(40.0)).unwrap();
        engine
    };

    let corrected = run_with(WipStrategy::Corrected);
    assert_eq!(corrected.finished_count(), 1);
    assert_eq!(corrected.completed()[0].released_at, fixed(4.0));
    assert_eq!(corrected.completed()[0].finished_at, fixed(16.0));

    // Under standard accounting the job never fits, and with an empty floor
    // no completion ever fires the continuous trigger.
    let standard = run_with(WipStrategy::Standard);
    assert_eq!(standard.finished_count(), 0);
    assert_eq!(standard.pool_len(), 1);
}

#[test]
fn slack_driven_release_feeds_an_emptying_server() {
    let mut builder = ShopBuilder::new();
    let m1 = builder.add_server(Server::new("m1", 1, ServerKind::Standard));
    let mut builder = builder
        .release_policy(ReleasePolicy::SlackDriven {
            allowance: fixed(1.0),
        })
        .starvation_avoidance(true);
    // The first arrival finds a starving server and bypasses the pool; the
    // second waits until the completion event pulls it in.
    builder.schedule_arrival(fixed(0.0), simple_job(m1, 2.0, 30.0));
    builder.schedule_arrival(fixed(0.0), simple_job(m1, 2.0, 10.0));
    let mut engine = builder.build_or_panic();

    engine.run(fixed(50.0)).unwrap();

    let released: Vec<Fixed64> = engine.completed().iter().map(|c| c.released_at).collect();
    assert_eq!(released, vec![fixed(0.0), fixed(2.0)]);
    assert_eq!(engine.finished_count(), 2);
}

#[test]
fn scored_release_picks_the_quick_job_and_persists_its_score() {
    let mut builder = ShopBuilder::new();
    let m1 = builder.add_server(Server::new("m1", 1, ServerKind::Standard));
    let mut builder = builder
        .release_policy(ReleasePolicy::Scored {
            weights: ScoreWeights {
                spt: fixed(1.0),
                starvation: Fixed64::ZERO,
                slack: Fixed64::ZERO,
                pace: Fixed64::ZERO,
            },
            norms: norms(&[]),
            authorization_limit: 3,
            target_release_rate: fixed(0.1),
            allowance: fixed(1.0),
        })
        .starvation_avoidance(true);
    builder.schedule_arrival(fixed(0.0), simple_job(m1, 1.0, 50.0));
    let mut engine = builder.build_or_panic();

    // These arrive while the primer holds the server, so the starvation
    // bypass stays quiet and both jobs pool up for the scored rule.
    let quick = engine
        .schedule_arrival(fixed(0.5), simple_job(m1, 1.0, 50.0))
        .unwrap();
    let slow = engine
        .schedule_arrival(fixed(0.5), simple_job(m1, 9.0, 50.0))
        .unwrap();

    engine.run(fixed(50.0)).unwrap();

    // At the primer's completion the SPT term favors the quick job:
    // score = 1 / (1 + 1) = 0.5, persisted as its dispatch priority.
    assert_eq!(engine.job(quick).unwrap().priority, fixed(0.5));
    assert_eq!(engine.job(quick).unwrap().released_at, Some(fixed(1.0)));
    assert_eq!(engine.job(slow).unwrap().released_at, Some(fixed(2.0)));
    assert_eq!(engine.finished_count(), 3);
}

#[test]
fn identical_seeds_reproduce_a_noisy_run() {
    let build = || {
        let mut builder = ShopBuilder::new();
        let m1 = builder.add_server(
            Server::new(
                "m1",
                1,
                ServerKind::Faulty {
                    time_between_failures: Sample::Exponential { mean: fixed(9.0) },
                    repair_time: Sample::Uniform {
                        lo: fixed(0.5),
                        hi: fixed(2.0),
                    },
                },
            )
            .with_setup(Sample::Uniform {
                lo: fixed(0.1),
                hi: fixed(0.4),
            }),
        );
        let mut builder = builder.seed(99);
        for i in 0..20 {
            builder.schedule_arrival(fixed(i as f64), simple_job(m1, 1.5, 40.0 + i as f64));
        }
        builder.build_or_panic()
    };

    let mut a = build();
    let mut b = build();
    a.run(fixed(500.0)).unwrap();
    b.run(fixed(500.0)).unwrap();

    assert_eq!(a.finished_count(), 20);
    let fa: Vec<Fixed64> = a.completed().iter().map(|c| c.finished_at).collect();
    let fb: Vec<Fixed64> = b.completed().iter().map(|c| c.finished_at).collect();
    assert_eq!(fa, fb);
}

#[test]
fn archive_and_emas_cover_every_finished_job() {
    let (mut engine, server) = one_machine_shop();
    for i in 0..5 {
        engine
            .schedule_arrival(fixed(i as f64 * 2.0), simple_job(server, 1.0, 100.0))
            .unwrap();
    }

    let releases = Rc::new(RefCell::new(0u32));
    let counter = releases.clone();
    engine.bus_mut().on(
        EventKind::JobReleased,
        Box::new(move |_| *counter.borrow_mut() += 1),
    );

    engine.run(fixed(100.0)).unwrap();

    assert_eq!(engine.released_count(), 5);
    assert_eq!(engine.finished_count(), 5);
    assert_eq!(engine.completed().len(), 5);
    assert_eq!(*releases.borrow(), 5);
    assert!(engine.emas().time_in_system.value().is_some());
    assert!(engine.peak_active_jobs() >= 1);

    // Arrivals are spaced wider than the processing time: flow time is
    // exactly the processing time for every job.
    for completed in engine.completed() {
        assert_eq!(completed.makespan, fixed(1.0));
        assert_eq!(completed.band, DueDateBand::Early);
    }
}
