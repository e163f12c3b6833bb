//! Property tests: the WIP counter always matches the items in progress and
//! never exceeds the active ceiling, whatever the mix of limit changes and
//! conservative-mode toggles. Admitted starts also respect the admission
//! limit.

use maple_governor_capacity::{CapacityConfig, CapacityGovernance, StartOutcome};
use maple_governor_types::{WorkItem, WorkItemId, WorkStatus};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

const POOL: usize = 6;

#[derive(Debug, Clone)]
enum Op {
    Add(usize),
    Start(usize),
    Complete(usize),
    Block(usize),
    RaiseLimit,
    RestoreLimit,
    EnterConservative,
    ExitConservative,
}

fn arb_op() -> impl Strategy<Value = Op> {
    let slot = 0..POOL;
    prop_oneof![
        3 => slot.clone().prop_map(Op::Add),
        4 => slot.clone().prop_map(Op::Start),
        2 => slot.clone().prop_map(Op::Complete),
        1 => slot.prop_map(Op::Block),
        1 => Just(Op::RaiseLimit),
        1 => Just(Op::RestoreLimit),
        1 => Just(Op::EnterConservative),
        1 => Just(Op::ExitConservative),
    ]
}

fn id(slot: usize) -> WorkItemId {
    WorkItemId::new(format!("item-{}", slot))
}

fn in_progress(governance: &CapacityGovernance) -> u32 {
    governance
        .work_items()
        .iter()
        .filter(|item| item.status == WorkStatus::InProgress)
        .count() as u32
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn wip_counter_tracks_in_progress_items(ops in prop::collection::vec(arb_op(), 1..60)) {
        let governance = CapacityGovernance::new(CapacityConfig::default());

        for op in ops {
            match op {
                Op::Add(slot) => {
                    let item = WorkItem::new(id(slot), "generated").with_estimates(5, 5, 5);
                    let _ = governance.add_work_item(item);
                }
                Op::Start(slot) => {
                    let admission = governance.admission_limit();
                    if let Ok(StartOutcome::Started) = governance.start_work_item(&id(slot)) {
                        prop_assert!(governance.current_wip() <= admission);
                    }
                }
                Op::Complete(slot) => {
                    let _ = governance.complete_work_item(&id(slot), 5, 10, 1);
                }
                Op::Block(slot) => {
                    let _ = governance.block_work_item(&id(slot), "generated");
                }
                Op::RaiseLimit => {
                    governance.request_wip_increase("generated");
                }
                Op::RestoreLimit => {
                    governance.restore_normal_wip_limit();
                }
                Op::EnterConservative => {
                    governance.enter_conservative_mode();
                }
                Op::ExitConservative => {
                    governance.exit_conservative_mode();
                }
            }

            prop_assert_eq!(governance.current_wip(), in_progress(&governance));
            prop_assert!(governance.current_wip() <= governance.wip_limit());
            prop_assert!(governance.admission_limit() <= governance.wip_limit());
            prop_assert!(governance.check_capacity_limits().wip_ok);
        }
    }

    #[test]
    fn completed_items_stay_completed(slots in prop::collection::vec(0..POOL, 1..30)) {
        let governance = CapacityGovernance::new(CapacityConfig::default());
        let mut completed = Vec::new();

        for slot in slots {
            let _ = governance.add_work_item(WorkItem::new(id(slot), "generated").with_estimates(3, 4, 4));
            let _ = governance.start_work_item(&id(slot));
            if governance.complete_work_item(&id(slot), 3, 5, 1).is_ok() {
                completed.push(id(slot));
            }
            let _ = governance.start_work_item(&id(slot));
        }

        for done in &completed {
            let item = governance.work_item(done).unwrap();
            prop_assert_eq!(item.status, WorkStatus::Completed);
        }
        prop_assert_eq!(governance.metrics().total_completed as usize, completed.len());
    }
}
