//! Property: handle table under arbitrary allocate/release sequences
//!
//! For any interleaving of allocations, releases, double releases and
//! releases of ids that were never minted, every live id resolves to the
//! object it was given to, no two live objects share an id, freed ids come
//! back last in first out, and a failed release leaves the free list alone.

use std::collections::BTreeMap;

use bridge_host::{BridgeError, HandleStats, HandleTable, ObjectRef};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Allocate,
    Release(u32),
}

/// Strategy for one table operation; ids range past what gets minted.
fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Allocate),
        2 => (0u32..24).prop_map(Op::Release),
    ]
}

/// Reference model: live objects by id plus the free stack.
#[derive(Default)]
struct Model {
    live: BTreeMap<u32, ObjectRef>,
    free: Vec<u32>,
    minted: u32,
}

impl Model {
    fn next_id(&mut self) -> u32 {
        self.free.pop().unwrap_or_else(|| {
            self.minted += 1;
            self.minted - 1
        })
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// The table behaves like the model after every step.
    #[test]
    fn table_matches_model(ops in proptest::collection::vec(arb_op(), 0..64)) {
        let mut table = HandleTable::new();
        let mut model = Model::default();

        for op in ops {
            match op {
                Op::Allocate => {
                    let object = ObjectRef::plain();
                    let id = table.allocate(object.clone());
                    prop_assert_eq!(id, model.next_id());
                    prop_assert!(model.live.insert(id, object).is_none());
                }
                Op::Release(id) => {
                    let released = table.release(id);
                    match model.live.remove(&id) {
                        Some(object) => {
                            prop_assert_eq!(released, Ok(object));
                            model.free.push(id);
                        }
                        None if id < model.minted => {
                            prop_assert_eq!(released, Err(BridgeError::DoubleRelease(id)));
                        }
                        None => {
                            prop_assert_eq!(released, Err(BridgeError::InvalidHandle(id)));
                        }
                    }
                }
            }

            prop_assert_eq!(
                table.stats(),
                HandleStats {
                    live: model.live.len(),
                    free: model.free.len(),
                    capacity: model.minted as usize,
                }
            );
            for (id, object) in &model.live {
                prop_assert_eq!(table.resolve(*id), Ok(object.clone()));
            }
        }
    }

    /// Releasing an id twice never lets two live objects share it.
    #[test]
    fn double_release_never_aliases(count in 1usize..12, victim in 0usize..12) {
        let mut table = HandleTable::new();
        let objects: Vec<_> = (0..count).map(|_| ObjectRef::plain()).collect();
        let ids: Vec<_> = objects.iter().map(|o| table.allocate(o.clone())).collect();
        let victim = ids[victim % count];

        prop_assert!(table.release(victim).is_ok());
        prop_assert_eq!(table.release(victim), Err(BridgeError::DoubleRelease(victim)));

        let first = ObjectRef::plain();
        let second = ObjectRef::plain();
        let a = table.allocate(first.clone());
        let b = table.allocate(second.clone());
        prop_assert_eq!(a, victim);
        prop_assert_ne!(a, b);
        prop_assert_eq!(table.resolve(a), Ok(first));
        prop_assert_eq!(table.resolve(b), Ok(second));
        prop_assert_eq!(table.live_count(), count + 1);
    }
}
