// ワーカー単位のカウンタ
//
// 各スロットは所有ワーカーだけが書き込むため、Relaxedなインクリメントで十分。
// 隣接スロット間のfalse sharingを避けるためキャッシュライン境界に揃える。

use crate::core::StateSnapshot;
use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 1ワーカー分のカウンタ (total, done, errors)
#[derive(Debug, Default)]
pub struct State {
    total: AtomicU64,
    done: AtomicU64,
    errors: AtomicU64,
}

impl State {
    pub(crate) fn record_attempt(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_done(&self) {
        self.done.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            total: self.total.load(Ordering::Relaxed),
            done: self.done.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// ワーカー数分のStateスロット
#[derive(Debug, Clone)]
pub(crate) struct SharedStates {
    slots: Arc<[CachePadded<State>]>,
}

impl SharedStates {
    pub(crate) fn new(workers: usize) -> Self {
        let slots: Vec<CachePadded<State>> =
            (0..workers).map(|_| CachePadded::new(State::default())).collect();
        Self {
            slots: slots.into(),
        }
    }

    /// worker_idのスロット。呼び出せるのはそのワーカー自身だけ
    pub(crate) fn slot(&self, worker_id: usize) -> &State {
        &self.slots[worker_id]
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn per_worker(&self) -> Vec<StateSnapshot> {
        self.slots.iter().map(|slot| slot.snapshot()).collect()
    }

    /// 全スロットの合算。書き込みとは同期しない
    pub(crate) fn aggregate(&self) -> StateSnapshot {
        self.slots.iter().map(|slot| slot.snapshot()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_are_cache_line_aligned() {
        assert!(std::mem::align_of::<CachePadded<State>>() >= 64);
        assert!(std::mem::size_of::<CachePadded<State>>() >= 64);
    }

    #[test]
    fn test_aggregate_sums_all_slots() {
        let states = SharedStates::new(3);
        states.slot(0).record_attempt();
        states.slot(0).record_done();
        states.slot(2).record_attempt();
        states.slot(2).record_error();
        states.slot(1).record_attempt();

        let total = states.aggregate();
        assert_eq!(total, StateSnapshot { total: 3, done: 1, errors: 1 });
        assert_eq!(total.in_flight(), 1);
        assert_eq!(states.per_worker()[1], StateSnapshot { total: 1, done: 0, errors: 0 });
        assert_eq!(states.len(), 3);
    }

    #[test]
    fn test_concurrent_writers_on_own_slots() {
        let states = SharedStates::new(4);

        std::thread::scope(|scope| {
            for worker_id in 0..4 {
                let states = &states;
                scope.spawn(move || {
                    for _ in 0..1_000 {
                        let slot = states.slot(worker_id);
                        slot.record_attempt();
                        slot.record_done();
                    }
                });
            }
        });

        assert_eq!(states.aggregate(), StateSnapshot { total: 4_000, done: 4_000, errors: 0 });
        for snapshot in states.per_worker() {
            assert_eq!(snapshot.total, snapshot.done + snapshot.errors);
        }
    }
}
