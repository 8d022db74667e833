//! Cooperative iteration: chunked walks, the yield oracle, and mutation
//! between ticks.

mod common;

use common::{TestFlow, TestMatch};
use flowtab::{FlowId, FlowQuery, FlowTable, QueryMode, RemovedReason, TickResult, YieldOracle};

/// Yields after every `every` visited slots; `usize::MAX` never yields.
struct CountingOracle {
    every: usize,
    seen: usize,
}

impl CountingOracle {
    fn never() -> Self {
        Self {
            every: usize::MAX,
            seen: 0,
        }
    }

    fn every(n: usize) -> Self {
        Self { every: n, seen: 0 }
    }
}

impl YieldOracle for CountingOracle {
    fn should_yield(&mut self) -> bool {
        self.seen += 1;
        self.every != usize::MAX && self.seen % self.every == 0
    }
}

fn populated(cap: usize, n: u64) -> FlowTable<TestFlow> {
    let mut ft = FlowTable::new(cap).unwrap();
    for id in 1..=n {
        ft.add(FlowId(id), &TestFlow::new(id)).unwrap();
    }
    ft
}

#[test]
fn full_walk_visits_each_live_slot_once() {
    let ft = populated(16, 5);
    let mut task = ft.iter_task(None, 0);
    let mut visited = Vec::new();
    let mut sentinels = 0;

    let res = task.tick(&ft, &mut CountingOracle::never(), |entry| match entry {
        Some(e) => visited.push(e.id().0),
        None => sentinels += 1,
    });

    assert_eq!(res, TickResult::Finished);
    visited.sort_unstable();
    assert_eq!(visited, vec![1, 2, 3, 4, 5]);
    assert_eq!(sentinels, 1);
}

#[test]
fn oracle_forces_continue() {
    let ft = populated(16, 5);
    let mut task = ft.iter_task(None, 0);
    let mut oracle = CountingOracle::every(4);
    let mut visited = 0;
    let mut finished = false;
    let mut ticks = 0;

    while !finished {
        let res = task.tick(&ft, &mut oracle, |entry| {
            if entry.is_some() {
                visited += 1;
            } else {
                finished = true;
            }
        });
        ticks += 1;
        if res == TickResult::Finished {
            break;
        }
    }

    assert!(finished);
    assert_eq!(visited, 5);
    // 16 slots at 4 per tick: the walk had to come back for more.
    assert!(ticks > 1);
}

#[test]
fn filtered_walk_applies_the_query() {
    let mut ft = FlowTable::new(16).unwrap();
    for id in 1..=6u64 {
        ft.add(
            FlowId(id),
            &TestFlow::new(id).with_priority(if id % 2 == 0 { 20 } else { 10 }),
        )
        .unwrap();
    }
    let query = FlowQuery::new(QueryMode::CookieOnly, TestMatch::exact(0)).priority(20);
    let mut task = ft.iter_task(Some(query), 0);
    let mut visited = Vec::new();

    task.tick(&ft, &mut CountingOracle::never(), |entry| {
        if let Some(e) = entry {
            visited.push(e.id().0);
        }
    });

    visited.sort_unstable();
    assert_eq!(visited, vec![2, 4, 6]);
}

#[test]
fn free_and_marked_slots_are_skipped() {
    let mut ft = populated(16, 4);
    ft.delete(FlowId(2)).unwrap();
    ft.mark_deleted(FlowId(3), RemovedReason::Delete).unwrap();

    let mut task = ft.iter_task(None, 0);
    let mut visited = Vec::new();
    task.tick(&ft, &mut CountingOracle::never(), |entry| {
        if let Some(e) = entry {
            visited.push(e.id().0);
        }
    });

    visited.sort_unstable();
    assert_eq!(visited, vec![1, 4]);
}

#[test]
fn deletion_between_ticks_is_observed() {
    let mut ft = populated(16, 6);
    let mut task = ft.iter_task(None, 0);
    let mut first_half = Vec::new();

    // Visit two slots, then yield.
    let res = task.tick(&ft, &mut CountingOracle::every(2), |entry| {
        if let Some(e) = entry {
            first_half.push(e.id().0);
        }
    });
    assert_eq!(res, TickResult::Continue);
    assert_eq!(first_half, vec![1, 2]);

    // Delete a not-yet-visited flow between ticks.
    ft.delete(FlowId(5)).unwrap();

    let mut rest = Vec::new();
    let mut finished = false;
    while !finished {
        let res = task.tick(&ft, &mut CountingOracle::every(2), |entry| match entry {
            Some(e) => rest.push(e.id().0),
            None => finished = true,
        });
        if res == TickResult::Finished {
            break;
        }
    }

    rest.sort_unstable();
    assert_eq!(rest, vec![3, 4, 6]);
}

#[test]
fn addition_between_ticks_at_unvisited_index_is_observed() {
    let mut ft = populated(16, 3);
    let mut task = ft.iter_task(None, 0);
    let mut visited = Vec::new();

    let res = task.tick(&ft, &mut CountingOracle::every(1), |entry| {
        if let Some(e) = entry {
            visited.push(e.id().0);
        }
    });
    assert_eq!(res, TickResult::Continue);

    // Slot 3 is still ahead of the walk; the new flow lands there.
    ft.add(FlowId(42), &TestFlow::new(42)).unwrap();

    let mut finished = false;
    while !finished {
        let res = task.tick(&ft, &mut CountingOracle::never(), |entry| match entry {
            Some(e) => visited.push(e.id().0),
            None => finished = true,
        });
        if res == TickResult::Finished {
            break;
        }
    }

    visited.sort_unstable();
    assert_eq!(visited, vec![1, 2, 3, 42]);
}

#[test]
fn empty_table_finishes_immediately() {
    let ft: FlowTable<TestFlow> = FlowTable::new(4).unwrap();
    let mut task = ft.iter_task(None, 7);
    assert_eq!(task.priority(), 7);

    let mut entries = 0;
    let mut sentinels = 0;
    let res = task.tick(&ft, &mut CountingOracle::never(), |entry| {
        if entry.is_some() {
            entries += 1;
        } else {
            sentinels += 1;
        }
    });
    assert_eq!(res, TickResult::Finished);
    assert_eq!(entries, 0);
    assert_eq!(sentinels, 1);
}
