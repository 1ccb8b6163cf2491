use super::*;

use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};

/// Reference model for [`KeyIndex`]: a plain hash map plus an explicit
/// LIFO free list, mirroring the documented position-recycling contract.
#[derive(Default)]
struct IndexModel {
    map: HashMap<i32, u32>,
    free: Vec<u32>,
    next: u32,
}

impl IndexModel {
    fn add(&mut self, key: i32) -> i32 {
        if let Some(&pos) = self.map.get(&key) {
            return pos as i32;
        }
        let pos = self.free.pop().unwrap_or_else(|| {
            let p = self.next;
            self.next += 1;
            p
        });
        self.map.insert(key, pos);
        -(pos as i32) - 1
    }

    fn remove(&mut self, key: i32) -> Option<u32> {
        let pos = self.map.remove(&key)?;
        self.free.push(pos);
        Some(pos)
    }

    fn clear(&mut self) {
        self.map.clear();
        self.free.clear();
        self.next = 0;
    }
}

fn validate_index(idx: &KeyIndex, model: &IndexModel) -> std::result::Result<(), TestCaseError> {
    prop_assert_eq!(idx.len(), model.map.len());
    prop_assert_eq!(idx.is_empty(), model.map.is_empty());
    // every bucket cell accounts for exactly one live mapping
    prop_assert_eq!(idx.sum_bucket_lens(), model.map.len());

    for (&key, &pos) in &model.map {
        prop_assert_eq!(idx.position(key), Some(pos));
        prop_assert!(idx.contains_position(pos));
        prop_assert_eq!(idx.raw_key(pos), key);
    }

    // the traversal yields exactly the live positions, each once
    let mut seen = BTreeSet::new();
    for pos in idx.positions() {
        prop_assert!(seen.insert(pos), "position {} yielded twice", pos);
    }
    let expected: BTreeSet<u32> = model.map.values().copied().collect();
    prop_assert_eq!(seen, expected);
    Ok(())
}

#[derive(Clone, Debug)]
enum Op {
    Add(i32),
    Remove(i32),
    Get(i32),
    Clear,
}

fn key_strategy() -> impl Strategy<Value = i32> + Clone {
    // a narrow band to force hits, collisions and recycling, plus the
    // occasional arbitrary key for bucket coverage
    prop_oneof![
        4 => -64..64i32,
        1 => any::<i32>(),
    ]
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    let key = key_strategy();
    let op = prop_oneof![
        50 => key.clone().prop_map(Op::Add),
        30 => key.clone().prop_map(Op::Remove),
        19 => key.prop_map(Op::Get),
        1 => Just(Op::Clear),
    ];
    prop::collection::vec(op, 0..=1500)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_index_equivalence(ops in ops_strategy()) {
        let mut idx = KeyIndex::new();
        let mut model = IndexModel::default();

        for op in ops {
            match op {
                Op::Add(key) => {
                    let got = idx.add(key);
                    prop_assert_eq!(got, Ok(model.add(key)));
                }
                Op::Remove(key) => {
                    prop_assert_eq!(idx.remove(key), model.remove(key));
                }
                Op::Get(key) => {
                    prop_assert_eq!(idx.position(key), model.map.get(&key).copied());
                    prop_assert_eq!(idx.contains_key(key), model.map.contains_key(&key));
                }
                Op::Clear => {
                    idx.clear();
                    model.clear();
                }
            }
        }
        validate_index(&idx, &model)?;
    }

    #[test]
    fn prop_int_int_map_equivalence(
        ops in prop::collection::vec(
            (key_strategy(), any::<i32>(), 0u8..100), 0..=1000)
    ) {
        const MISSING: i32 = i32::MIN;
        let mut map = IntIntMap::new(MISSING);
        let mut model: HashMap<i32, i32> = HashMap::new();

        for (key, value, action) in ops {
            match action {
                0..=49 => {
                    let old = map.put(key, value).unwrap();
                    prop_assert_eq!(old, model.insert(key, value).unwrap_or(MISSING));
                }
                50..=74 => {
                    prop_assert_eq!(map.remove(key), model.remove(&key).unwrap_or(MISSING));
                }
                75..=97 => {
                    prop_assert_eq!(map.get(key), model.get(&key).copied().unwrap_or(MISSING));
                    prop_assert_eq!(map.contains_key(key), model.contains_key(&key));
                }
                _ => {
                    map.update_values(|k, v| v.wrapping_add(k)).unwrap();
                    for (k, v) in model.iter_mut() {
                        *v = v.wrapping_add(*k);
                    }
                }
            }
            prop_assert_eq!(map.len(), model.len());
        }

        let entries: HashMap<i32, i32> = map.entries().collect();
        prop_assert_eq!(entries, model);
    }

    #[test]
    fn prop_split_tree_is_a_partition(keys in prop::collection::btree_set(any::<i32>(), 0..=3000)) {
        let mut idx = KeyIndex::new();
        for &k in &keys {
            idx.add(k).unwrap();
        }

        // split recursively until no cursor is willing to split further
        let mut work = vec![idx.cursor()];
        let mut done = Vec::new();
        while let Some(mut cur) = work.pop() {
            match cur.try_split(&idx).unwrap() {
                Some(handed) => {
                    work.push(cur);
                    work.push(handed);
                }
                None => done.push(cur),
            }
        }

        let mut positions = BTreeSet::new();
        for cur in done {
            let expected = cur.expected();
            let mut yielded = 0usize;
            cur.for_each(&idx, |p| {
                assert!(positions.insert(p), "position {p} in two cursors");
                yielded += 1;
            })
            .unwrap();
            prop_assert_eq!(yielded, expected);
        }
        prop_assert_eq!(positions.len(), keys.len());
        prop_assert_eq!(positions, (0..keys.len() as u32).collect::<BTreeSet<_>>());
    }

    #[test]
    fn prop_key_hash_ignores_insertion_order(
        keys in prop::collection::btree_set(any::<i32>(), 0..=200).prop_flat_map(|set| {
            let forward: Vec<i32> = set.into_iter().collect();
            let shuffled = Just(forward.clone()).prop_shuffle();
            (Just(forward), shuffled)
        })
    ) {
        let (forward, shuffled) = keys;
        let mut a = KeyIndex::new();
        let mut b = KeyIndex::new();
        for k in &forward {
            a.add(*k).unwrap();
        }
        for k in &shuffled {
            b.add(*k).unwrap();
        }
        prop_assert_eq!(a.key_hash(), b.key_hash());
    }

    #[test]
    fn prop_map_equality_ignores_insertion_order(
        pairs in prop::collection::btree_map(any::<i32>(), any::<i32>(), 0..=200)
            .prop_flat_map(|map| {
                let forward: Vec<(i32, i32)> = map.into_iter().collect();
                let shuffled = Just(forward.clone()).prop_shuffle();
                (Just(forward), shuffled)
            })
    ) {
        let (forward, shuffled) = pairs;
        let mut a = IntIntMap::new(-1);
        let mut b = IntIntMap::new(0);
        for (k, v) in &forward {
            a.put(*k, *v).unwrap();
        }
        for (k, v) in &shuffled {
            b.put(*k, *v).unwrap();
        }
        // positions may differ, content equality must not
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(&a, &a);
    }

    #[test]
    fn prop_chunked_array_matches_vec(
        ops in prop::collection::vec((0usize..4096, any::<i64>()), 0..=500)
    ) {
        let mut arr: ChunkedArray<i64> = ChunkedArray::new();
        let mut model: HashMap<usize, i64> = HashMap::new();

        for (at, value) in ops {
            let old = arr.set(at, value).unwrap();
            prop_assert_eq!(old, model.insert(at, value).unwrap_or_default());
        }
        for (at, value) in &model {
            prop_assert_eq!(arr.get(*at), Ok(*value));
        }
        // unwritten slots read as the default
        prop_assert_eq!(arr.get(4096), Ok(0));
    }
}
