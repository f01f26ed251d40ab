use super::*;

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Bound;

use proptest::prelude::*;
use proptest_derive::Arbitrary;

use crate::node::{Disc, Node, NodeId};

type ByteTrie = PatriciaTrie<Vec<u8>, u32, ByteAnalyzer>;

fn validate_trie<K, V, A>(t: &PatriciaTrie<K, V, A>)
where
    A: KeyAnalyzer,
    K: Borrow<A::Key>,
{
    let Some(root) = t.root else {
        assert_eq!(t.count, 0, "empty root must mean an empty trie");
        assert_eq!(t.nodes.live(), 0, "empty trie must hold no nodes");
        return;
    };
    assert_eq!(t.nodes.parent(root), None, "root must not have a parent");

    // Each entry carries the (discriminator, side) pairs taken to reach it.
    let mut stack: Vec<(NodeId, Vec<(Disc, usize)>)> = vec![(root, Vec::new())];
    let mut leaf_count = 0usize;
    while let Some((id, path)) = stack.pop() {
        match t.nodes.node(id) {
            Node::Branch(branch) => {
                if let Some(&(above, _)) = path.last() {
                    assert!(
                        above < branch.disc,
                        "discriminators must strictly increase: {above:?} then {:?}",
                        branch.disc
                    );
                }
                for (side, &child) in branch.children.iter().enumerate() {
                    assert_eq!(
                        t.nodes.parent(child),
                        Some(id),
                        "child must link back to its parent"
                    );
                    let mut down = path.clone();
                    down.push((branch.disc, side));
                    stack.push((child, down));
                }
            }
            Node::Leaf(leaf) => {
                leaf_count += 1;
                let key = leaf.key.borrow();
                let len = t.analyzer.bit_length(key);
                for &(disc, side) in &path {
                    assert_eq!(
                        disc.side(&t.analyzer, key, len),
                        side,
                        "leaf is on the wrong side of {disc:?}"
                    );
                }
            }
        }
    }

    assert_eq!(leaf_count, t.count, "reachable leaf count must match len");
    assert_eq!(
        t.nodes.live(),
        2 * t.count - 1,
        "a trie with n leaves must hold n - 1 branches"
    );

    let keys: Vec<&K> = t.keys().collect();
    for pair in keys.windows(2) {
        assert_eq!(
            t.analyzer.compare(pair[0].borrow(), pair[1].borrow()),
            Ordering::Less,
            "iteration must be strictly ascending"
        );
    }
}

/// Short keys over a tiny alphabet, so prefixes, shared runs and trailing
/// NUL bytes come up constantly.
fn key_strategy() -> impl Strategy<Value = Vec<u8>> + Clone {
    prop::collection::vec(0u8..3, 0..=5)
}

fn prefix_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(0u8..3, 0..=2)
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 50)]
    Insert(#[proptest(strategy = "key_strategy()")] Vec<u8>, u32),
    #[proptest(weight = 25)]
    Remove(#[proptest(strategy = "key_strategy()")] Vec<u8>),
    #[proptest(weight = 15)]
    Get(#[proptest(strategy = "key_strategy()")] Vec<u8>),
    #[proptest(weight = 4)]
    PopFirst,
    #[proptest(weight = 4)]
    PopLast,
    #[proptest(weight = 2)]
    ClearPrefix(#[proptest(strategy = "prefix_strategy()")] Vec<u8>),
    #[proptest(weight = 1)]
    ShrinkToFit,
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(any::<Op>(), 0..=400)
}

fn populated() -> impl Strategy<Value = (BTreeMap<Vec<u8>, u32>, Vec<u8>)> {
    (
        prop::collection::btree_map(key_strategy(), any::<u32>(), 0..=40),
        key_strategy(),
    )
}

fn build(m: &BTreeMap<Vec<u8>, u32>) -> ByteTrie {
    m.iter().map(|(k, v)| (k.clone(), *v)).collect()
}

/// Key as the sequence of discriminator tests the trie can branch on:
/// for each bit, its value then whether the key extends past it.
fn virtual_bits(key: &[u8], width: usize) -> Vec<bool> {
    let len = ByteAnalyzer.bit_length(key);
    (0..width)
        .flat_map(|bit| [ByteAnalyzer.is_bit_set(key, bit, len), len > bit])
        .collect()
}

fn xor_nearest<'a>(keys: impl Iterator<Item = &'a Vec<u8>>, query: &[u8]) -> Option<&'a Vec<u8>> {
    const WIDTH: usize = 64;
    let q = virtual_bits(query, WIDTH);
    keys.min_by_key(|k| {
        virtual_bits(k, WIDTH)
            .iter()
            .zip(&q)
            .map(|(a, b)| a ^ b)
            .collect::<Vec<bool>>()
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(ops in ops_strategy()) {
        let mut t: ByteTrie = PatriciaTrie::new();
        let mut m: BTreeMap<Vec<u8>, u32> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(key, value) => {
                    let old_t = t.insert(key.clone(), value);
                    let old_m = m.insert(key, value);
                    prop_assert_eq!(old_t, old_m);
                }
                Op::Remove(key) => {
                    let old_t = t.remove(&key);
                    let old_m = m.remove(key.as_slice());
                    prop_assert_eq!(old_t, old_m);
                }
                Op::Get(key) => {
                    prop_assert_eq!(t.get(&key), m.get(key.as_slice()));
                    prop_assert_eq!(t.contains_key(&key), m.contains_key(key.as_slice()));
                }
                Op::PopFirst => {
                    prop_assert_eq!(t.pop_first(), m.pop_first());
                }
                Op::PopLast => {
                    prop_assert_eq!(t.pop_last(), m.pop_last());
                }
                Op::ClearPrefix(prefix) => {
                    let before = m.len();
                    m.retain(|k, _| !k.starts_with(&prefix));
                    let removed = t.prefix_view_mut(&prefix).clear();
                    prop_assert_eq!(removed, before - m.len());
                }
                Op::ShrinkToFit => {
                    t.shrink_to_fit();
                }
            }

            prop_assert_eq!(t.len(), m.len());
        }

        validate_trie(&t);
        let got: Vec<(Vec<u8>, u32)> = t.iter().map(|(k, v)| (k.clone(), *v)).collect();
        let expected: Vec<(Vec<u8>, u32)> = m.iter().map(|(k, v)| (k.clone(), *v)).collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_neighbours((m, q) in populated()) {
        let t = build(&m);
        let q = q.as_slice();

        prop_assert_eq!(t.ceiling(q), m.range::<[u8], _>((Bound::Included(q), Bound::Unbounded)).next());
        prop_assert_eq!(t.higher(q), m.range::<[u8], _>((Bound::Excluded(q), Bound::Unbounded)).next());
        prop_assert_eq!(t.floor(q), m.range::<[u8], _>((Bound::Unbounded, Bound::Included(q))).next_back());
        prop_assert_eq!(t.lower(q), m.range::<[u8], _>((Bound::Unbounded, Bound::Excluded(q))).next_back());
    }

    #[test]
    fn prop_prefix_view((m, prefix) in populated()) {
        let t = build(&m);
        let view = t.prefix_view(&prefix);

        let got: Vec<&Vec<u8>> = view.keys().collect();
        let expected: Vec<&Vec<u8>> = m.keys().filter(|k| k.starts_with(&prefix)).collect();
        prop_assert_eq!(view.len(), expected.len());
        prop_assert_eq!(view.is_empty(), expected.is_empty());
        prop_assert_eq!(&got, &expected);

        let back: Vec<&Vec<u8>> = view.keys().rev().collect();
        let expected_back: Vec<&Vec<u8>> = expected.iter().rev().copied().collect();
        prop_assert_eq!(back, expected_back);
    }

    #[test]
    fn prop_sub_view(
        (m, a) in populated(),
        b in key_strategy(),
        lo_inclusive in any::<bool>(),
        hi_inclusive in any::<bool>(),
    ) {
        let t = build(&m);
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };

        let view = t.sub_view(&lo, lo_inclusive, &hi, hi_inclusive);
        prop_assert!(view.is_ok());
        let got: Vec<(&Vec<u8>, &u32)> = view.map(|v| v.iter().collect()).unwrap_or_default();

        let expected: Vec<(&Vec<u8>, &u32)> = m
            .iter()
            .filter(|(k, _)| {
                let above = if lo_inclusive { **k >= lo } else { **k > lo };
                let below = if hi_inclusive { **k <= hi } else { **k < hi };
                above && below
            })
            .collect();
        prop_assert_eq!(got, expected);

        if lo != hi {
            prop_assert!(matches!(
                t.sub_view(&hi, true, &lo, true),
                Err(TrieError::InvalidRange)
            ));
        }
    }

    #[test]
    fn prop_select_is_xor_nearest((m, q) in populated()) {
        let t = build(&m);
        prop_assert_eq!(t.select_key(&q), xor_nearest(m.keys(), &q));
        if let Some(exact) = m.keys().next() {
            prop_assert_eq!(t.select_key(exact), Some(exact));
        }
    }

    #[test]
    fn prop_cursor_removes_every_other((m, _q) in populated()) {
        let mut t = build(&m);
        let mut cursor = t.cursor();
        let mut kept = Vec::new();
        let mut remove_next = false;
        while let Some((k, _)) = cursor.next(&t).expect("only the cursor modifies the trie") {
            let k = k.clone();
            if remove_next {
                let (removed, _) = cursor.remove(&mut t).expect("cursor is positioned");
                prop_assert_eq!(removed, k);
            } else {
                kept.push(k);
            }
            remove_next = !remove_next;
        }

        validate_trie(&t);
        let got: Vec<Vec<u8>> = t.keys().cloned().collect();
        prop_assert_eq!(got, kept);
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

fn small_key_set() -> Vec<Vec<u8>> {
    vec![
        b"".to_vec(),
        b"a".to_vec(),
        b"a\0".to_vec(),
        b"a\0\0".to_vec(),
        b"ab".to_vec(),
        b"b".to_vec(),
    ]
}

#[test]
fn exhaustive_insert_order_small_set() {
    let keys = small_key_set();

    for_each_permutation(&keys, |perm| {
        let mut t: ByteTrie = PatriciaTrie::new();
        let mut m: BTreeMap<Vec<u8>, u32> = BTreeMap::new();

        for (i, k) in perm.into_iter().enumerate() {
            let v = i as u32;
            assert_eq!(t.insert(k.clone(), v), m.insert(k, v));
            validate_trie(&t);
        }

        let got: Vec<(Vec<u8>, u32)> = t.iter().map(|(k, v)| (k.clone(), *v)).collect();
        let expected: Vec<(Vec<u8>, u32)> = m.iter().map(|(k, v)| (k.clone(), *v)).collect();
        assert_eq!(got, expected);

        let under_a: Vec<&[u8]> = t.prefix_view(b"a").keys().map(Vec::as_slice).collect();
        assert_eq!(under_a, [&b"a"[..], b"a\0", b"a\0\0", b"ab"]);
    });
}

#[test]
fn exhaustive_remove_order_small_set() {
    let keys = small_key_set();

    // Insert in a fixed order, then remove in all permutations.
    let mut base_trie: ByteTrie = PatriciaTrie::new();
    let mut base_map: BTreeMap<Vec<u8>, u32> = BTreeMap::new();
    for (i, k) in keys.iter().enumerate() {
        let v = i as u32;
        assert_eq!(base_trie.insert(k.clone(), v), base_map.insert(k.clone(), v));
    }

    for_each_permutation(&keys, |perm| {
        let mut t = base_trie.clone();
        let mut m = base_map.clone();

        for k in perm {
            assert_eq!(t.remove(&k), m.remove(k.as_slice()));
            assert_eq!(t.len(), m.len());
            validate_trie(&t);
        }
        assert!(t.is_empty());
        assert!(t.root.is_none());
    });
}

#[test]
fn char_keys_follow_str_order() {
    let words = ["", "a", "ab", "abc", "b", "é", "中文", "中", "a\u{0}", "z"];
    for_each_permutation(&words[..6], |perm| {
        let t: PatriciaTrie<String, ()> = perm.iter().map(|w| (w.to_string(), ())).collect();
        validate_trie(&t);
        let got: Vec<&str> = t.keys().map(String::as_str).collect();
        let mut expected = perm.clone();
        expected.sort_unstable();
        assert_eq!(got, expected);
    });

    let t: PatriciaTrie<String, ()> = words.iter().map(|w| (w.to_string(), ())).collect();
    validate_trie(&t);
    let got: Vec<&str> = t.keys().map(String::as_str).collect();
    let mut expected = words.to_vec();
    expected.sort_unstable();
    assert_eq!(got, expected);
}
