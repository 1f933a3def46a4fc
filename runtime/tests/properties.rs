//! Property tests: random stock levels, buyer counts, process counts and commit
//! failures never oversell and never lose a unit.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use flash_sale_core::{CommitError, LocalAdmissionCache, ProductId, SpikeState};
use flash_sale_runtime::SpikeOrchestrator;
use flash_sale_testing::{InMemoryCoordinationCluster, InMemoryStockCounter, ScriptedSaleCommitter};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

const PRODUCT: ProductId = ProductId::new(7);

#[derive(Debug)]
struct Run {
    states: Vec<SpikeState>,
    final_counter: i64,
    committed: u64,
    flag: Option<bool>,
}

fn simulate(stock: i64, processes: usize, buyers: usize, failures: &[bool]) -> Run {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap();

    runtime.block_on(async {
        let counter = InMemoryStockCounter::with_stock([(PRODUCT, stock)]);
        let cluster = InMemoryCoordinationCluster::new();
        // The delay parks every commit so attempts interleave.
        let committer = ScriptedSaleCommitter::new().with_delay(Duration::from_millis(5));
        for &fail in failures {
            if fail {
                committer.push_failure(CommitError::Database("injected".into()));
            } else {
                committer.push_success();
            }
        }

        let orchestrators: Vec<SpikeOrchestrator> = (0..processes)
            .map(|_| {
                SpikeOrchestrator::new(
                    Arc::new(LocalAdmissionCache::new()),
                    Arc::new(counter.clone()),
                    Arc::new(cluster.session()),
                    Arc::new(committer.clone()),
                )
            })
            .collect();

        let mut tasks = tokio::task::JoinSet::new();
        for buyer in 0..buyers {
            let orchestrator = orchestrators[buyer % processes].clone();
            tasks.spawn(async move {
                // Stagger arrivals so some land while commits are parked.
                tokio::time::sleep(Duration::from_millis((buyer % 4) as u64 * 2)).await;
                orchestrator.try_attempt_spike(PRODUCT).await.unwrap()
            });
        }

        let mut states = Vec::with_capacity(buyers);
        while let Some(state) = tasks.join_next().await {
            states.push(state.unwrap());
        }

        Run {
            states,
            final_counter: counter.value(PRODUCT).unwrap(),
            committed: committer.committed(PRODUCT),
            flag: cluster.flag(PRODUCT),
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn stock_is_conserved(
        stock in 0i64..12,
        processes in 1usize..4,
        buyers in 1usize..40,
        failures in proptest::collection::vec(any::<bool>(), 0..16),
    ) {
        let run = simulate(stock, processes, buyers, &failures);

        let committed_states = run
            .states
            .iter()
            .filter(|s| **s == SpikeState::Committed)
            .count() as u64;

        // Non-negativity once all requests settled.
        prop_assert!(run.final_counter >= 0, "{run:?}");
        // Conservation: every success took exactly one unit, nothing else did.
        prop_assert_eq!(run.final_counter, stock - i64::try_from(run.committed).unwrap());
        prop_assert_eq!(committed_states, run.committed);
        // No oversell.
        prop_assert!(run.committed <= u64::try_from(stock).unwrap());
        prop_assert!(run.states.iter().all(|s| s.is_terminal()));
    }

    #[test]
    fn buyers_beyond_stock_without_failures_sell_out(
        stock in 0i64..10,
        extra in 1usize..10,
        processes in 1usize..4,
    ) {
        let buyers = usize::try_from(stock).unwrap() + extra;
        let run = simulate(stock, processes, buyers, &[]);

        prop_assert_eq!(run.committed, u64::try_from(stock).unwrap());
        prop_assert_eq!(run.final_counter, 0);
        prop_assert_eq!(run.flag, Some(true));
    }
}
