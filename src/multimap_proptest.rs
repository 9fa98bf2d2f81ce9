#![cfg(test)]

// Property tests for MultiMap kept inside the crate so they can also check
// BackingMap bookkeeping that the public API does not expose.

use crate::{Error, ListMultiMap, MultiMap, SetMultiMap, UniqueSet, ViewIter};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hasher};

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Add(usize, i32),
    AddRange(usize, Vec<i32>),
    SetRange(usize, Vec<i32>),
    Remove(usize),
    RemoveValue(usize, i32),
    ClearKey(usize),
    ViewPush(usize, i32),
    ViewRemoveAt(usize, usize),
    ViewSort(usize),
    Clear,
    Contains(String),
    Iterate,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=6).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let small = -4i32..4;
        let values = proptest::collection::vec(small.clone(), 0..4);
        let op = prop_oneof![
            4 => (idx.clone(), small.clone()).prop_map(|(i, v)| OpI::Add(i, v)),
            2 => (idx.clone(), values.clone()).prop_map(|(i, vs)| OpI::AddRange(i, vs)),
            1 => (idx.clone(), values).prop_map(|(i, vs)| OpI::SetRange(i, vs)),
            1 => idx.clone().prop_map(OpI::Remove),
            3 => (idx.clone(), small.clone()).prop_map(|(i, v)| OpI::RemoveValue(i, v)),
            1 => idx.clone().prop_map(OpI::ClearKey),
            2 => (idx.clone(), small).prop_map(|(i, v)| OpI::ViewPush(i, v)),
            1 => (idx.clone(), 0usize..4).prop_map(|(i, p)| OpI::ViewRemoveAt(i, p)),
            1 => idx.prop_map(OpI::ViewSort),
            1 => Just(OpI::Clear),
            1 => prop_oneof![contains_pool, "[a-z]{0,4}"].prop_map(OpI::Contains),
            1 => Just(OpI::Iterate),
        ];
        proptest::collection::vec(op, 1..60).prop_map(move |ops| (pool.clone(), ops))
    })
}

// State-machine equivalence against HashMap<Key, Vec<i32>>, where the model
// never stores an empty Vec. Invariants exercised after every op:
// - a key is present iff its collection is non-empty;
// - value_count equals the sum of per-key sizes (checked against the
//   BackingMap's own running total as well);
// - every change of the model moves the version; the version never goes back;
// - per-key contents and order match the model.
fn run_state_machine<S>(
    sut: MultiMap<Key, Vec<i32>, S>,
    pool: Vec<String>,
    ops: Vec<OpI>,
) -> Result<(), TestCaseError>
where
    S: BuildHasher,
{
    let mut model: HashMap<Key, Vec<i32>> = HashMap::new();

    for op in ops {
        let version_before = sut.version();
        let model_before = model.clone();
        match op {
            OpI::Add(i, v) => {
                let k = key_from(&pool, i);
                prop_assert!(sut.add(k.clone(), v));
                model.entry(k).or_default().push(v);
            }
            OpI::AddRange(i, vs) => {
                let k = key_from(&pool, i);
                let view = sut.add_range(k.clone(), vs.clone());
                if !vs.is_empty() {
                    model.entry(k.clone()).or_default().extend(vs);
                }
                prop_assert_eq!(view.is_some(), model.contains_key(&k));
            }
            OpI::SetRange(i, vs) => {
                let k = key_from(&pool, i);
                let view = sut.set_range(k.clone(), vs.clone());
                prop_assert_eq!(view.is_some(), !vs.is_empty());
                if vs.is_empty() {
                    model.remove(&k);
                } else {
                    model.insert(k, vs);
                }
            }
            OpI::Remove(i) => {
                let k = key_from(&pool, i);
                prop_assert_eq!(sut.remove(&k), model.remove(&k).is_some());
            }
            OpI::RemoveValue(i, v) => {
                let k = key_from(&pool, i);
                let expected = match model.get_mut(&k) {
                    Some(vs) => match vs.iter().position(|x| *x == v) {
                        Some(p) => {
                            vs.remove(p);
                            if vs.is_empty() {
                                model.remove(&k);
                            }
                            true
                        }
                        None => false,
                    },
                    None => false,
                };
                prop_assert_eq!(sut.remove_value(&k, &v), expected);
            }
            OpI::ClearKey(i) => {
                let k = key_from(&pool, i);
                prop_assert_eq!(sut.clear_key(&k), model.remove(&k).is_some());
            }
            OpI::ViewPush(i, v) => {
                let k = key_from(&pool, i);
                sut.view(k.clone()).push(v);
                model.entry(k).or_default().push(v);
            }
            OpI::ViewRemoveAt(i, p) => {
                let k = key_from(&pool, i);
                let got = sut.view(k.clone()).remove_at(p);
                match model.get_mut(&k) {
                    None => prop_assert_eq!(got, Err(Error::KeyNotFound)),
                    Some(vs) if p >= vs.len() => prop_assert_eq!(
                        got,
                        Err(Error::IndexOutOfRange { index: p, len: vs.len() })
                    ),
                    Some(vs) => {
                        prop_assert_eq!(got, Ok(vs.remove(p)));
                        if vs.is_empty() {
                            model.remove(&k);
                        }
                    }
                }
            }
            OpI::ViewSort(i) => {
                let k = key_from(&pool, i);
                sut.view(k.clone()).sort();
                if let Some(vs) = model.get_mut(&k) {
                    vs.sort();
                }
            }
            OpI::Clear => {
                sut.clear();
                model.clear();
            }
            OpI::Contains(s) => {
                let has = sut.contains_key(s.as_str());
                let has_model = model.keys().any(|k| k.0 == s);
                prop_assert_eq!(has, has_model);
            }
            OpI::Iterate => {
                let keys: Vec<Key> = sut.keys().iter().collect::<Result<_, _>>().unwrap();
                let s_keys: BTreeSet<_> = keys.iter().cloned().collect();
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(s_keys.len(), keys.len(), "keys enumerate once each");
                prop_assert_eq!(s_keys, m_keys);
                let flat: Vec<i32> = sut.values().iter().collect::<Result<_, _>>().unwrap();
                let expected: Vec<i32> = keys.iter().flat_map(|k| model[k].clone()).collect();
                prop_assert_eq!(flat, expected);
            }
        }

        // Post-conditions after each op
        prop_assert!(sut.version() >= version_before);
        if model != model_before {
            prop_assert!(sut.version() > version_before, "model changed, version must move");
        }
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        let total: usize = model.values().map(Vec::len).sum();
        prop_assert_eq!(sut.value_count(), total);
        prop_assert_eq!(sut.shared().borrow().value_count(), total);
        for s in &pool {
            let k = Key(s.clone());
            let expected = model.get(&k).cloned().unwrap_or_default();
            prop_assert_eq!(sut.contains_key(&k), !expected.is_empty());
            prop_assert_eq!(sut.value_count_of(&k), expected.len());
            prop_assert_eq!(sut.view(k).to_vec(), expected);
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_state_machine(ListMultiMap::new(), pool, ops)?;
    }
}

// Collision variant using a constant hasher to stress equality resolution.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// Same state-machine invariants under worst-case collision behavior, which
// stresses probing and the unlink-by-identity path.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_state_machine(MultiMap::with_hasher(ConstBuildHasher), pool, ops)?;
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_set_state_machine((pool, ops) in arb_set_scenario()) {
        run_set_state_machine(SetMultiMap::new(), pool, ops)?;
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_set_state_machine_with_collisions((pool, ops) in arb_set_scenario()) {
        run_set_state_machine(MultiMap::with_hasher(ConstBuildHasher), pool, ops)?;
    }
}

// Set-valued operations, pool-indexed like `OpI`.
#[derive(Clone, Debug)]
enum SetOpI {
    Add(usize, i32),
    AddRange(usize, Vec<i32>),
    Remove(usize),
    RemoveValue(usize, i32),
    ClearKey(usize),
    Union(usize, Vec<i32>),
    Intersect(usize, Vec<i32>),
    Except(usize, Vec<i32>),
    SymmetricExcept(usize, Vec<i32>),
    RetainEven(usize, bool),
    Clear,
    Iterate,
}

fn arb_set_scenario() -> impl Strategy<Value = (Vec<String>, Vec<SetOpI>)> {
    proptest::collection::vec("[a-z]{0,3}", 1..=4).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let small = 0i32..6;
        let values = proptest::collection::vec(small.clone(), 0..5);
        let op = prop_oneof![
            4 => (idx.clone(), small.clone()).prop_map(|(i, v)| SetOpI::Add(i, v)),
            1 => (idx.clone(), values.clone()).prop_map(|(i, vs)| SetOpI::AddRange(i, vs)),
            1 => idx.clone().prop_map(SetOpI::Remove),
            2 => (idx.clone(), small).prop_map(|(i, v)| SetOpI::RemoveValue(i, v)),
            1 => idx.clone().prop_map(SetOpI::ClearKey),
            2 => (idx.clone(), values.clone()).prop_map(|(i, vs)| SetOpI::Union(i, vs)),
            2 => (idx.clone(), values.clone()).prop_map(|(i, vs)| SetOpI::Intersect(i, vs)),
            2 => (idx.clone(), values.clone()).prop_map(|(i, vs)| SetOpI::Except(i, vs)),
            3 => (idx.clone(), values).prop_map(|(i, vs)| SetOpI::SymmetricExcept(i, vs)),
            1 => (idx, any::<bool>()).prop_map(|(i, even)| SetOpI::RetainEven(i, even)),
            1 => Just(SetOpI::Clear),
            1 => Just(SetOpI::Iterate),
        ];
        proptest::collection::vec(op, 1..60).prop_map(move |ops| (pool.clone(), ops))
    })
}

// State-machine equivalence against HashMap<Key, BTreeSet<i32>>, where the
// model never stores an empty set. Invariants after every op:
// - presence, value_count and per-key contents match the model;
// - every change of the model moves the version;
// - a view enumerator started before an op on a present key fails once that
//   key's contents change, even when its size stays the same.
fn run_set_state_machine<S>(
    sut: MultiMap<Key, UniqueSet<i32>, S>,
    pool: Vec<String>,
    ops: Vec<SetOpI>,
) -> Result<(), TestCaseError>
where
    S: BuildHasher,
{
    let mut model: HashMap<Key, BTreeSet<i32>> = HashMap::new();

    for op in ops {
        let version_before = sut.version();
        let model_before = model.clone();
        let mut watch: Option<(Key, ViewIter<Key, UniqueSet<i32>>)> = None;
        match op {
            SetOpI::Add(i, v) => {
                let k = key_from(&pool, i);
                let fresh = model.entry(k.clone()).or_default().insert(v);
                prop_assert_eq!(sut.add(k, v), fresh);
            }
            SetOpI::AddRange(i, vs) => {
                let k = key_from(&pool, i);
                let view = sut.add_range(k.clone(), vs.clone());
                model.entry(k.clone()).or_default().extend(vs);
                let present = model.get(&k).is_some_and(|s| !s.is_empty());
                prop_assert_eq!(view.is_some(), present);
            }
            SetOpI::Remove(i) => {
                let k = key_from(&pool, i);
                prop_assert_eq!(sut.remove(&k), model.remove(&k).is_some());
            }
            SetOpI::RemoveValue(i, v) => {
                let k = key_from(&pool, i);
                let expected = model.get_mut(&k).is_some_and(|s| s.remove(&v));
                prop_assert_eq!(sut.remove_value(&k, &v), expected);
            }
            SetOpI::ClearKey(i) => {
                let k = key_from(&pool, i);
                prop_assert_eq!(sut.clear_key(&k), model.remove(&k).is_some());
            }
            SetOpI::Union(i, vs) => {
                let k = key_from(&pool, i);
                let view = sut.view(k.clone());
                watch = Some((k.clone(), view.iter()));
                let set = model.entry(k).or_default();
                let expected = vs.iter().filter(|v| set.insert(**v)).count();
                prop_assert_eq!(view.union_with(vs), expected);
            }
            SetOpI::Intersect(i, vs) => {
                let k = key_from(&pool, i);
                let view = sut.view(k.clone());
                watch = Some((k.clone(), view.iter()));
                let set = model.entry(k).or_default();
                let before = set.len();
                set.retain(|v| vs.contains(v));
                prop_assert_eq!(view.intersect_with(vs), before - set.len());
            }
            SetOpI::Except(i, vs) => {
                let k = key_from(&pool, i);
                let view = sut.view(k.clone());
                watch = Some((k.clone(), view.iter()));
                let set = model.entry(k).or_default();
                let before = set.len();
                for v in &vs {
                    set.remove(v);
                }
                prop_assert_eq!(view.except_with(vs), before - set.len());
            }
            SetOpI::SymmetricExcept(i, vs) => {
                let k = key_from(&pool, i);
                let view = sut.view(k.clone());
                watch = Some((k.clone(), view.iter()));
                let set = model.entry(k).or_default();
                let toggle: BTreeSet<i32> = vs.iter().copied().collect();
                for v in toggle {
                    if !set.remove(&v) {
                        set.insert(v);
                    }
                }
                view.symmetric_except_with(vs);
            }
            SetOpI::RetainEven(i, even) => {
                let k = key_from(&pool, i);
                let view = sut.view(k.clone());
                watch = Some((k.clone(), view.iter()));
                let keep = move |v: &i32| (v % 2 == 0) == even;
                let set = model.entry(k).or_default();
                let before = set.len();
                set.retain(|v| keep(v));
                prop_assert_eq!(view.retain(keep), before - set.len());
            }
            SetOpI::Clear => {
                sut.clear();
                model.clear();
            }
            SetOpI::Iterate => {
                let keys: Vec<Key> = sut.keys().iter().collect::<Result<_, _>>().unwrap();
                let s_keys: BTreeSet<_> = keys.iter().cloned().collect();
                prop_assert_eq!(s_keys.len(), keys.len(), "keys enumerate once each");
                prop_assert_eq!(s_keys, model.keys().cloned().collect::<BTreeSet<_>>());
                let mut flat: Vec<i32> = sut.values().iter().collect::<Result<_, _>>().unwrap();
                let mut expected: Vec<i32> = model.values().flatten().copied().collect();
                flat.sort();
                expected.sort();
                prop_assert_eq!(flat, expected);
            }
        }
        model.retain(|_, s| !s.is_empty());

        prop_assert!(sut.version() >= version_before);
        if model != model_before {
            prop_assert!(sut.version() > version_before, "model changed, version must move");
        }
        prop_assert_eq!(sut.len(), model.len());
        let total: usize = model.values().map(BTreeSet::len).sum();
        prop_assert_eq!(sut.value_count(), total);
        prop_assert_eq!(sut.shared().borrow().value_count(), total);
        for s in &pool {
            let k = Key(s.clone());
            let expected = model.get(&k).cloned().unwrap_or_default();
            prop_assert_eq!(sut.contains_key(&k), !expected.is_empty());
            prop_assert_eq!(sut.value_count_of(&k), expected.len());
            let got = sut.view(k).to_vec();
            prop_assert_eq!(got.len(), expected.len(), "no duplicates");
            prop_assert_eq!(got.into_iter().collect::<BTreeSet<_>>(), expected);
        }
        if let Some((k, mut it)) = watch {
            if model_before.contains_key(&k) && model_before.get(&k) != model.get(&k) {
                prop_assert_eq!(it.next(), Some(Err(Error::ConcurrentModification)));
            }
        }
    }
    Ok(())
}
