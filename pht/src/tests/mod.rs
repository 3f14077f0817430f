use crate::*;
use proptest::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::HashSet;

fn options(hash_function: HashFunctionId, mask_function: MaskFunctionId) -> CreateOptions {
    CreateOptions::default()
        .with_hash_function(hash_function)
        .with_mask_function(mask_function)
        .with_context(ContextConfig::default().with_maximum_concurrency(2))
}

fn random_keys(count: usize, seed: u64) -> KeySet {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut seen = HashSet::new();
    let mut pairs = Vec::with_capacity(count);
    while pairs.len() < count {
        let key: u32 = rng.gen();
        if seen.insert(key) {
            pairs.push((key, rng.gen()));
        }
    }
    KeySet::new(pairs)
}

fn assert_perfect(table: &PerfectHashTable<'_>, keys: &KeySet) {
    let mut slots = HashSet::new();
    for (key, value) in keys.iter() {
        let index = table.index(key).unwrap();
        assert!(index < table.table_size(), "{index} out of bounds");
        assert!(slots.insert(index), "key {key:#x} collides at {index}");
        assert_eq!(table.lookup(key).unwrap(), value);
    }
}

#[test]
fn test_key_example() {
    let allocator = HeapAllocator::new();
    let keys = KeySet::new([(TEST_KEY, 0), (0x10, 1), (0x20, 2), (0x30, 3)]);
    let mut table = create(
        &keys,
        Algorithm::Chm01.id(),
        &allocator,
        &options(HashFunctionId::default(), MaskFunctionId::default()),
    )
    .unwrap();
    assert!(test(&mut table));
    assert_eq!(table.lookup(TEST_KEY).unwrap(), 0);
    assert_eq!(table.table_size(), 4);
    assert_perfect(&table, &keys);
}

#[test]
fn single_test_pair_on_every_mask() {
    let allocator = HeapAllocator::new();
    let keys = KeySet::new([(TEST_KEY, TEST_VALUE)]);
    for mask_function in MaskFunctionId::ALL {
        let mut table = Some(
            create(
                &keys,
                Algorithm::Chm01.id(),
                &allocator,
                &options(HashFunctionId::default(), mask_function),
            )
            .unwrap(),
        );
        let created = table.as_mut().unwrap();
        assert_eq!(created.table_size(), 1);
        assert_eq!(created.index(TEST_KEY).unwrap(), 0);
        assert!(test(created));
        assert_eq!(created.lookup(TEST_KEY).unwrap(), TEST_VALUE);
        assert!(created.verify(&keys));
        destroy(&mut table, false).unwrap();
        assert!(table.is_none());
    }
    assert_eq!(allocator.outstanding(), 0);
}

#[test]
fn every_mask_with_rapid() {
    let allocator = HeapAllocator::new();
    let keys = random_keys(5000, 1);
    for mask_function in MaskFunctionId::ALL {
        let table = create(
            &keys,
            Algorithm::Chm01.id(),
            &allocator,
            &options(HashFunctionId::Rapid, mask_function),
        )
        .unwrap();
        assert_eq!(table.mask_function(), mask_function);
        if mask_function.is_modulus() {
            assert_eq!(table.table_size(), 5000);
        } else {
            assert_eq!(table.table_size(), 8192);
        }
        assert_perfect(&table, &keys);
    }
    assert_eq!(allocator.outstanding(), 0);
}

#[test]
fn crc_and_rotation_hashes_with_modulus() {
    let allocator = HeapAllocator::new();
    let keys = random_keys(2000, 2);
    for hash_function in [HashFunctionId::Crc32Rotate, HashFunctionId::RotateXor] {
        let table = create(
            &keys,
            Algorithm::Chm01.id(),
            &allocator,
            &options(hash_function, MaskFunctionId::Modulus),
        )
        .unwrap();
        assert_eq!(table.hash_function(), hash_function);
        assert_perfect(&table, &keys);
    }
}

#[test]
fn seeds_reproduce_the_table() {
    let allocator = HeapAllocator::new();
    let keys = random_keys(1000, 3);
    let table = create(
        &keys,
        Algorithm::Chm01.id(),
        &allocator,
        &options(HashFunctionId::Rapid, MaskFunctionId::And),
    )
    .unwrap();
    let assigned = chm01::solve_with_seeds(keys.keys(), table.parameters(), &allocator)
        .unwrap()
        .unwrap();
    assert_eq!(&*assigned, table.assigned());
}

#[test]
fn save_and_load() {
    let allocator = HeapAllocator::new();
    let dir = tempfile::tempdir().unwrap();
    let keys_path = dir.path().join("random.keys");
    let keys = random_keys(3000, 4);
    keys.save_keys(&keys_path).unwrap();

    let reread = KeySet::load(&keys_path).unwrap();
    assert_eq!(reread.keys(), keys.keys());

    let table_path = table_path_for_keys(&keys_path);
    let created = create(
        &keys,
        Algorithm::Chm01.id(),
        &allocator,
        &options(HashFunctionId::Rapid, MaskFunctionId::XorAnd).with_output_path(&table_path),
    )
    .unwrap();
    let mut loaded = Some(load(&table_path, &allocator).unwrap());
    let table = loaded.as_ref().unwrap();

    assert_eq!(table.parameters(), created.parameters());
    assert_eq!(table.number_of_keys(), 3000);
    assert_eq!(table.stats(), created.stats());
    assert_perfect(table, &keys);

    destroy(&mut loaded, false).unwrap();
    drop(created);
    assert_eq!(allocator.outstanding(), 0);
}

#[test]
fn stats_describe_the_run() {
    let allocator = HeapAllocator::new();
    let keys = random_keys(500, 5);
    let table = create(
        &keys,
        Algorithm::Chm01.id(),
        &allocator,
        &options(HashFunctionId::Rapid, MaskFunctionId::Modulus),
    )
    .unwrap();
    let stats = table.stats().unwrap();
    assert!(stats.winning_attempt >= 1);
    assert!(stats.winning_attempt <= stats.attempts);
    assert!(stats.winning_worker < 2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn distinct_keys_get_distinct_slots(keys in prop::collection::hash_set(any::<u32>(), 1..400)) {
        let allocator = HeapAllocator::new();
        let keys = KeySet::new(keys.into_iter().zip(0..));
        let table = create(
            &keys,
            Algorithm::Chm01.id(),
            &allocator,
            &options(HashFunctionId::Rapid, MaskFunctionId::Modulus),
        )
        .unwrap();
        prop_assert!(table.verify(&keys));
        let mut slots = HashSet::new();
        for (key, _) in keys.iter() {
            let index = table.index(key).unwrap();
            prop_assert!(index < table.table_size());
            prop_assert!(slots.insert(index));
        }
    }

    #[test]
    fn bytes_preserve_lookups(
        keys in prop::collection::hash_set(any::<u32>(), 1..200),
        stranger in any::<u32>(),
    ) {
        let allocator = HeapAllocator::new();
        let keys = KeySet::new(keys.into_iter().map(|key| (key, key.rotate_left(9))));
        let table = create(
            &keys,
            Algorithm::Chm01.id(),
            &allocator,
            &options(HashFunctionId::Rapid, MaskFunctionId::And),
        )
        .unwrap();
        let loaded = load_from_bytes(&table.to_bytes().unwrap(), &allocator).unwrap();
        for (key, value) in keys.iter() {
            prop_assert_eq!(loaded.index(key).unwrap(), table.index(key).unwrap());
            prop_assert_eq!(loaded.lookup(key).unwrap(), value);
        }
        prop_assert_eq!(loaded.index(stranger).unwrap(), table.index(stranger).unwrap());
    }
}
