//! Force-driven channel flow on simulated ranks.
//!
//! Demonstrates: decomposition → load balancing over ranks → dynamics by
//! material → initialize → step → reduced statistics → compare the
//! centreline speed with the analytic Poiseuille profile.
//!
//! Run with `RUST_LOG=eddy_engine=debug` to see communicator setup.

use eddy_bench::{channel_profile, poiseuille_peak, ChannelProfile};
use eddy_comm::Universe;
use eddy_core::{Descriptor, Platform, ProcessingContext, RankId, D2Q9};
use eddy_engine::RunContext;
use tracing::info;
use tracing_subscriber::EnvFilter;

const RANKS: usize = 2;
const STEPS: u64 = 4000;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let profile = ChannelProfile {
        extent: [64, 34],
        cuboids: 4,
        platform: Platform::CpuSimd,
        omega: 1.2,
        force: 2e-6,
        momenta: false,
    };
    let expected = poiseuille_peak(&profile);

    let peaks = Universe::run(RANKS, |comm| {
        let ctx = RunContext::builder(comm).seed(42).build();
        let rank = ctx.rank();
        let mut lattice = match channel_profile(ctx, &profile) {
            Ok(l) => l,
            Err(e) => panic!("rank {rank}: setup failed: {e}"),
        };

        while lattice.iteration() < STEPS {
            lattice.collide_and_stream();
            if lattice.iteration() % 500 == 0 {
                let stats = lattice.statistics().unwrap_or_default();
                if rank == RankId::ROOT {
                    info!(
                        iteration = lattice.iteration(),
                        avg_rho = stats.average_rho,
                        max_u = stats.max_u,
                        step_us = lattice.metrics().total_us,
                        comm_us = lattice.metrics().communication_total_us(),
                        "progress"
                    );
                }
            }
        }

        lattice.set_processing_context(ProcessingContext::Evaluation);
        let mut peak = 0.0_f64;
        lattice.for_each_core_cell(|_, _, cell| {
            let (rho, u) = D2Q9::rho_u(cell.populations());
            if rho > 0.0 {
                peak = peak.max(u[0] + 0.5 * profile.force / rho);
            }
        });
        peak
    });

    let measured = peaks.into_iter().fold(0.0, f64::max);
    println!("=== Eddy channel flow ({RANKS} ranks, {STEPS} steps) ===");
    println!("  centreline speed: {measured:.4e}");
    println!("  analytic peak:    {expected:.4e}");
    println!("  relative error:   {:.2}%", 100.0 * (measured - expected).abs() / expected);
}
