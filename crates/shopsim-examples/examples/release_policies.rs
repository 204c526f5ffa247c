//! Release policy comparison: the same seeded arrival stream pushed through
//! a three-machine shop under immediate, workload-norm, and slack-driven
//! release, with KPIs collected by shopsim-stats.
//!
//! Run with: `cargo run -p shopsim-examples --example release_policies`

use std::cell::RefCell;
use std::rc::Rc;

use shopsim_core::agv::{Agv, Location, TravelModel};
use shopsim_core::builder::ShopBuilder;
use shopsim_core::engine::Engine;
use shopsim_core::event::EventKind;
use shopsim_core::fixed::{f64_to_fixed64, fixed64_to_f64};
use shopsim_core::id::{FamilyId, ProductId, ServerId};
use shopsim_core::job::{JobSpec, MaterialNeed, OperationSpec};
use shopsim_core::policies::ReleasePolicy;
use shopsim_core::rng::Sample;
use shopsim_core::server::{Server, ServerKind};
use shopsim_core::store::Store;
use shopsim_stats::{ShopStats, StatsConfig};
use slotmap::SecondaryMap;

const HORIZON: f64 = 400.0;
const WINDOW: f64 = 20.0;
const SEED: u64 = 2024;

/// Three machines with noisy setups, a stocked warehouse, and two
/// vehicles; returns the engine and its servers.
fn build_shop(policy: fn(&[ServerId]) -> ReleasePolicy) -> (Engine, Vec<ServerId>) {
    let mut builder = ShopBuilder::new();
    let servers: Vec<ServerId> = (0..3)
        .map(|i| {
            builder.add_server(
                Server::new(format!("m{i}"), 1, ServerKind::Standard)
                    .with_setup(Sample::Uniform {
                        lo: f64_to_fixed64(0.1),
                        hi: f64_to_fixed64(0.5),
                    })
                    .with_location(Location::new(4 + 2 * i as i32, 0)),
            )
        })
        .collect();

    let blanks = ProductId(0);
    builder.add_store(
        Store::new("warehouse", 2)
            .with_service_times(
                Sample::Uniform {
                    lo: f64_to_fixed64(0.2),
                    hi: f64_to_fixed64(0.6),
                },
                Sample::Constant(f64_to_fixed64(0.5)),
            )
            .with_location(Location::new(0, 0))
            .with_stock(blanks, 100),
    );
    for name in ["agv1", "agv2"] {
        builder.add_agv(Agv::new(
            name,
            TravelModel::Manhattan {
                time_per_cell: f64_to_fixed64(0.25),
            },
        ));
    }

    let mut builder = builder
        .seed(SEED)
        .release_policy(policy(&servers))
        .starvation_avoidance(true);

    // A steady stream of jobs alternating between two routings, with due
    // dates tight enough that the release policy matters. The long routing
    // starts from a raw blank staged out of the warehouse.
    for i in 0..60u32 {
        let at = f64_to_fixed64(f64::from(i) * 3.0);
        let route: Vec<OperationSpec> = if i % 2 == 0 {
            vec![
                OperationSpec::new(servers[0], f64_to_fixed64(2.0)).with_material(MaterialNeed {
                    product: blanks,
                    quantity: 1,
                    store: None,
                }),
                OperationSpec::new(servers[1], f64_to_fixed64(3.0)),
                OperationSpec::new(servers[2], f64_to_fixed64(1.0)),
            ]
        } else {
            vec![
                OperationSpec::new(servers[1], f64_to_fixed64(2.5)),
                OperationSpec::new(servers[2], f64_to_fixed64(2.0)),
            ]
        };
        let due = at + f64_to_fixed64(30.0);
        builder.schedule_arrival(at, JobSpec::new(FamilyId(i % 2), route, due));
    }

    match builder.build() {
        Ok(engine) => (engine, servers),
        Err(err) => panic!("shop failed to build: {err}"),
    }
}

fn attach_stats(engine: &mut Engine) -> Rc<RefCell<ShopStats>> {
    let stats = Rc::new(RefCell::new(ShopStats::new(StatsConfig::default())));
    let kinds = [
        EventKind::JobReleased,
        EventKind::JobFinished,
        EventKind::OperationCompleted,
    ];
    for kind in kinds {
        let sink = stats.clone();
        engine
            .bus_mut()
            .on(kind, Box::new(move |event| sink.borrow_mut().process_event(event)));
    }
    stats
}

fn run_policy(name: &str, policy: fn(&[ServerId]) -> ReleasePolicy) {
    let (mut engine, servers) = build_shop(policy);
    let stats = attach_stats(&mut engine);

    // Close a stats window every WINDOW time units.
    let mut t = WINDOW;
    while t <= HORIZON {
        if let Err(err) = engine.run(f64_to_fixed64(t)) {
            panic!("run failed: {err}");
        }
        stats.borrow_mut().end_window(f64_to_fixed64(t));
        t += WINDOW;
    }

    let mut stats = stats.borrow_mut();
    for completed in engine.completed() {
        stats.observe_completed(completed);
    }

    println!("--- {name} ---");
    println!(
        "  finished {:>3}   still pooled {:>2}   peak on floor {:>2}",
        stats.total_finished(),
        engine.pool_len(),
        engine.peak_active_jobs()
    );
    println!(
        "  avg flow time {:>6.2}   tardy share {:>5.3}   throughput/window {:>5.2}",
        fixed64_to_f64(stats.average_flow_time()),
        fixed64_to_f64(stats.tardy_share()),
        fixed64_to_f64(stats.throughput())
    );
    for (i, server) in servers.iter().enumerate() {
        println!(
            "  m{i}: {:>3} ops completed, {:>5.2} per window",
            stats.server_total_completions(*server),
            fixed64_to_f64(stats.server_completion_rate(*server))
        );
    }
    println!();
}

fn main() {
    println!("Release policy comparison, seed {SEED}, horizon {HORIZON}\n");

    run_policy("immediate", |_| ReleasePolicy::Immediate);

    run_policy("workload norm", |servers| {
        let mut norms = SecondaryMap::new();
        for &server in servers {
            norms.insert(server, f64_to_fixed64(12.0));
        }
        ReleasePolicy::WorkloadNorm {
            norms,
            allowance: f64_to_fixed64(5.0),
            check_interval: f64_to_fixed64(4.0),
        }
    });

    run_policy("slack driven", |_| ReleasePolicy::SlackDriven {
        allowance: f64_to_fixed64(2.0),
    });
}
