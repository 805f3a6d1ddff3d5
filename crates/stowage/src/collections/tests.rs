//! Cross-collection scenarios and model-based properties.
//!
//! Per-kind behavior lives next to each kind; this module checks the
//! contracts that span kinds: length consistency against reference models,
//! ordered-scan correctness against `BTreeMap`, codec-version guards, kind
//! guards, and prefix isolation under interleaved mutations.

use crate::{
    collections::{IterableMap, IterableSet, LookupMap, OrderedMap, Sequence},
    error::{DecodeError, Error},
    meta::{CollectionKind, HeaderDecodeError},
    prefix::Prefix,
    serialize::{self, SerializeError, ValueCodec},
    store::MemoryStore,
};
use proptest::prelude::*;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;

fn prefix(label: &str) -> Prefix {
    Prefix::try_from(label).expect("test prefix")
}

// ── Length accounting against raw storage (invariant I1) ─────────────

#[test]
fn lookup_map_length_equals_stored_entry_count() {
    let host = MemoryStore::new();
    let prefix = prefix("acct");
    let mut map: LookupMap<String, u64, MemoryStore> =
        LookupMap::with_host(prefix.clone(), host.clone());

    for i in 0..8u64 {
        map.set(&format!("k{i}"), &i).expect("set");
    }
    for i in [1u64, 4, 7] {
        map.remove(&format!("k{i}")).expect("remove");
    }

    let entry_keys = host
        .raw_keys_with_prefix(prefix.as_bytes())
        .into_iter()
        .filter(|key| key.get(prefix.as_bytes().len()) == Some(&0xF0))
        .count() as u64;

    assert_eq!(map.len().expect("len"), 5);
    assert_eq!(entry_keys, 5);
}

// ── Kind guard matrix (P12) ──────────────────────────────────────────

#[test]
fn kind_guard_fires_across_all_kind_pairs() {
    let host = MemoryStore::new();
    let prefix = prefix("guard");

    let mut ordered: OrderedMap<String, u64, MemoryStore> =
        OrderedMap::with_host(prefix.clone(), host.clone());
    ordered.set(&"k".into(), &1).expect("set");

    let iterable: IterableMap<String, u64, MemoryStore> =
        IterableMap::with_host(prefix.clone(), host.clone());
    assert!(matches!(
        iterable.len(),
        Err(Error::KindMismatch {
            expected: CollectionKind::IterableMap,
            found: CollectionKind::OrderedMap,
        })
    ));

    let seq: Sequence<u64, MemoryStore> = Sequence::with_host(prefix.clone(), host.clone());
    assert!(matches!(
        seq.len(),
        Err(Error::KindMismatch {
            expected: CollectionKind::Sequence,
            found: CollectionKind::OrderedMap,
        })
    ));

    let mut set: IterableSet<String, MemoryStore> = IterableSet::with_host(prefix, host);
    assert!(matches!(
        set.add(&"k".into()),
        Err(Error::KindMismatch {
            expected: CollectionKind::IterableSet,
            found: CollectionKind::OrderedMap,
        })
    ));
}

// ── Codec version guard ──────────────────────────────────────────────

// A hypothetical second codec revision: same wire format, bumped version.
struct CborV2;

impl ValueCodec for CborV2 {
    const VERSION: u16 = 2;

    fn encode<T>(value: &T) -> Result<Vec<u8>, SerializeError>
    where
        T: Serialize,
    {
        serialize::serialize(value)
    }

    fn decode<T>(bytes: &[u8]) -> Result<T, SerializeError>
    where
        T: DeserializeOwned,
    {
        serialize::deserialize(bytes)
    }
}

#[test]
fn stored_codec_version_rejects_newer_handle() {
    let host = MemoryStore::new();
    let prefix = prefix("codecv");

    let mut seq: Sequence<String, MemoryStore> =
        Sequence::with_host(prefix.clone(), host.clone());
    seq.push(&"a".to_string()).expect("push");

    let reopened: Sequence<String, MemoryStore, CborV2> = Sequence::with_host(prefix, host);
    let err = reopened.len().expect_err("version drift must fail");
    assert!(matches!(
        err,
        Error::Decode(DecodeError::Header(HeaderDecodeError::CodecVersion {
            stored: 1,
            expected: 2,
        }))
    ));
}

// ── Prefix isolation under interleaving (P11) ────────────────────────

#[test]
fn sibling_collections_of_different_kinds_stay_isolated() {
    let host = MemoryStore::new();
    let users = prefix("users");

    let mut names: IterableMap<u64, String, MemoryStore> =
        IterableMap::with_host(users.child("names").expect("child"), host.clone());
    let mut scores: OrderedMap<u64, u64, MemoryStore> =
        OrderedMap::with_host(users.child("scores").expect("child"), host.clone());
    let mut log: Sequence<String, MemoryStore> =
        Sequence::with_host(users.child("log").expect("child"), host);

    names.set(&1, &"alice".to_string()).expect("set");
    scores.set(&1, &700).expect("set");
    log.push(&"created".to_string()).expect("push");
    names.remove(&1).expect("remove");
    scores.set(&2, &300).expect("set");

    assert_eq!(names.len().expect("len"), 0);
    assert_eq!(scores.len().expect("len"), 2);
    assert_eq!(log.len().expect("len"), 1);
    assert_eq!(scores.min_key().expect("min"), 1);
}

// ── Per-user sub-collections via the prefix composer ─────────────────

#[test]
fn nested_per_user_sequences_do_not_interfere() {
    let host = MemoryStore::new();
    let inbox = prefix("inbox");

    let mut alice: Sequence<String, MemoryStore> =
        Sequence::with_host(inbox.child("alice").expect("child"), host.clone());
    let mut bob: Sequence<String, MemoryStore> =
        Sequence::with_host(inbox.child("bob").expect("child"), host);

    alice.push(&"hi bob".to_string()).expect("push");
    bob.push(&"hi alice".to_string()).expect("push");
    bob.push(&"are you there?".to_string()).expect("push");

    assert_eq!(alice.len().expect("len"), 1);
    assert_eq!(bob.len().expect("len"), 2);
    assert_eq!(alice.get(0).expect("get"), "hi bob");
}

// ── Structured values through the default codec ──────────────────────

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
struct Receipt {
    payer: String,
    amount: u128,
    memo: Option<String>,
}

#[test]
fn struct_values_roundtrip_through_the_codec() {
    let host = MemoryStore::new();
    let mut ledger: IterableMap<u64, Receipt, MemoryStore> =
        IterableMap::with_host(prefix("ledger"), host);

    let receipt = Receipt {
        payer: "alice".into(),
        amount: 1_000_000_000_000,
        memo: Some("rent".into()),
    };
    ledger.set(&7, &receipt).expect("set");

    assert_eq!(ledger.get(&7).expect("get"), Some(receipt.clone()));

    let entries: Vec<(u64, Receipt)> = ledger
        .iter()
        .expect("iter")
        .collect::<Result<_, _>>()
        .expect("iteration");
    assert_eq!(entries, vec![(7, receipt)]);
}

// ── Storage traffic accounting ───────────────────────────────────────

#[test]
fn host_traffic_is_accounted() {
    crate::obs::reset();

    let mut seq: Sequence<u64, MemoryStore> =
        Sequence::with_host(prefix("traffic"), MemoryStore::new());
    seq.push(&1).expect("push");
    seq.push(&2).expect("push");
    seq.get(0).expect("get");

    let report = crate::obs::report();
    // Two pushes: at least two slot writes and two header writes.
    assert!(report.writes >= 4, "writes: {report:?}");
    // Header loads and the slot read all count.
    assert!(report.reads >= 3, "reads: {report:?}");
}

// ── Model-based properties ───────────────────────────────────────────

#[derive(Clone, Debug)]
enum MapOp {
    Set(String, u64),
    Remove(String),
    Get(String),
}

fn small_key() -> impl Strategy<Value = String> {
    (0..6u8).prop_map(|i| format!("k{i}"))
}

fn map_op() -> impl Strategy<Value = MapOp> {
    prop_oneof![
        (small_key(), any::<u64>()).prop_map(|(k, v)| MapOp::Set(k, v)),
        small_key().prop_map(MapOp::Remove),
        small_key().prop_map(MapOp::Get),
    ]
}

proptest! {
    // P1 + P3 + P4: length consistency, idempotent removal, iterable
    // completeness, checked after every operation against a model map.
    #[test]
    fn iterable_map_matches_reference_model(
        ops in proptest::collection::vec(map_op(), 1..50),
    ) {
        let mut map: IterableMap<String, u64, MemoryStore> =
            IterableMap::with_host(Prefix::try_from("model").expect("prefix"), MemoryStore::new());
        let mut model: BTreeMap<String, u64> = BTreeMap::new();

        for op in ops {
            match op {
                MapOp::Set(key, value) => {
                    map.set(&key, &value).expect("set");
                    model.insert(key, value);
                }
                MapOp::Remove(key) => {
                    let removed = map.remove(&key).expect("remove");
                    prop_assert_eq!(removed, model.remove(&key));
                }
                MapOp::Get(key) => {
                    prop_assert_eq!(map.get(&key).expect("get"), model.get(&key).copied());
                }
            }

            prop_assert_eq!(map.len().expect("len"), model.len() as u64);
            prop_assert_eq!(map.index_len().expect("index len"), model.len() as u64);
        }

        let collected: BTreeMap<String, u64> = map
            .iter()
            .expect("iter")
            .collect::<Result<_, _>>()
            .expect("iteration");
        prop_assert_eq!(collected, model);
    }

    // P5 + P6 + P7: sorted scans, floor/ceiling, and range windows agree
    // with BTreeMap over the same data.
    #[test]
    fn ordered_map_agrees_with_btreemap(
        entries in proptest::collection::btree_map(0..200u64, any::<u64>(), 0..24),
        removals in proptest::collection::vec(0..200u64, 0..8),
        probes in proptest::collection::vec(0..220u64, 1..12),
        window in (0..220u64, 0..220u64),
    ) {
        let mut map: OrderedMap<u64, u64, MemoryStore> =
            OrderedMap::with_host(Prefix::try_from("sorted").expect("prefix"), MemoryStore::new());
        let mut model = entries;

        for (key, value) in &model {
            map.set(key, value).expect("set");
        }
        for key in removals {
            prop_assert_eq!(map.remove(&key).expect("remove"), model.remove(&key));
        }

        let keys: Vec<u64> = map
            .keys()
            .expect("keys")
            .collect::<Result<_, _>>()
            .expect("key iteration");
        let model_keys: Vec<u64> = model.keys().copied().collect();
        prop_assert_eq!(&keys, &model_keys);
        prop_assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));

        for probe in probes {
            let floor = map.floor(&probe).expect("floor");
            let ceiling = map.ceiling(&probe).expect("ceiling");
            prop_assert_eq!(floor, model.range(..=probe).next_back().map(|(k, _)| *k));
            prop_assert_eq!(ceiling, model.range(probe..).next().map(|(k, _)| *k));
        }

        let (lo, hi) = window;
        let scanned: Vec<u64> = map
            .range(lo..hi)
            .expect("range")
            .collect::<Result<_, _>>()
            .expect("range iteration");
        let expected: Vec<u64> = if lo < hi {
            model.range(lo..hi).map(|(k, _)| *k).collect()
        } else {
            Vec::new()
        };
        prop_assert_eq!(scanned, expected);
    }
}

#[derive(Clone, Debug)]
enum SeqOp {
    Push(u64),
    Pop,
    Overwrite(u64, u64),
    SwapRemove(u64),
}

fn seq_op() -> impl Strategy<Value = SeqOp> {
    prop_oneof![
        any::<u64>().prop_map(SeqOp::Push),
        Just(SeqOp::Pop),
        (any::<u64>(), any::<u64>()).prop_map(|(i, v)| SeqOp::Overwrite(i, v)),
        any::<u64>().prop_map(SeqOp::SwapRemove),
    ]
}

proptest! {
    // P1 + P9 for the sequence: length, contents, and the multiset effect
    // of swap_remove, mirrored against Vec.
    #[test]
    fn sequence_matches_reference_model(
        ops in proptest::collection::vec(seq_op(), 1..50),
    ) {
        let mut seq: Sequence<u64, MemoryStore> =
            Sequence::with_host(Prefix::try_from("seqmodel").expect("prefix"), MemoryStore::new());
        let mut model: Vec<u64> = Vec::new();

        for op in ops {
            match op {
                SeqOp::Push(value) => {
                    seq.push(&value).expect("push");
                    model.push(value);
                }
                SeqOp::Pop => match seq.pop() {
                    Ok(value) => prop_assert_eq!(Some(value), model.pop()),
                    Err(Error::Empty) => prop_assert!(model.is_empty()),
                    Err(other) => panic!("pop failed: {other}"),
                },
                SeqOp::Overwrite(index, value) => {
                    if model.is_empty() {
                        prop_assert!(
                            matches!(seq.set(index, &value), Err(Error::OutOfRange { .. })),
                            "expected OutOfRange error"
                        );
                    } else {
                        let index = index % model.len() as u64;
                        seq.set(index, &value).expect("set");
                        model[index as usize] = value;
                    }
                }
                SeqOp::SwapRemove(index) => {
                    if model.is_empty() {
                        prop_assert!(
                            matches!(seq.swap_remove(index), Err(Error::OutOfRange { .. })),
                            "expected OutOfRange error"
                        );
                    } else {
                        let index = index % model.len() as u64;
                        let removed = seq.swap_remove(index).expect("swap_remove");
                        prop_assert_eq!(removed, model.swap_remove(index as usize));
                    }
                }
            }

            prop_assert_eq!(seq.len().expect("len"), model.len() as u64);
        }

        let collected: Vec<u64> = seq
            .iter()
            .expect("iter")
            .collect::<Result<_, _>>()
            .expect("iteration");
        prop_assert_eq!(collected, model);
    }
}
