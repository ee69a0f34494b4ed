use std::collections::HashMap;

use crossbeam_utils::thread;
use kvcache::{KvServer, KvsEngine, KvsError};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

fn server() -> KvServer {
    KvServer::new(10, 10)
}

#[test]
fn put_get_del() {
    let server = server();
    server.put("k1".to_owned(), "k1".to_owned()).unwrap();
    assert_eq!(server.get("k1").unwrap(), "k1");
    server.put("k1".to_owned(), "k2".to_owned()).unwrap();
    assert_eq!(server.get("k1").unwrap(), "k2");
    server.del("k1").unwrap();
    assert!(matches!(server.get("k1"), Err(KvsError::NoSuchKey)));
}

#[test]
fn overwrite_and_delete_another_key() {
    let server = server();
    server.put("fuzzy".to_owned(), "wuzzy".to_owned()).unwrap();
    server.put("key2".to_owned(), "value2".to_owned()).unwrap();
    server.put("fuzzy".to_owned(), "ursa".to_owned()).unwrap();
    assert_eq!(server.get("fuzzy").unwrap(), "ursa");

    server.del("key2").unwrap();
    let err = server.get("key2").unwrap_err();
    assert_eq!(err.to_string(), "Data Error: Key does not exist");
}

#[test]
fn nonexistent_get_and_del_fail() {
    let server = server();
    assert!(matches!(
        server.get("this key shouldn't be here"),
        Err(KvsError::NoSuchKey)
    ));
    assert!(matches!(server.del("a"), Err(KvsError::NoSuchKey)));
}

#[test]
fn second_delete_fails() {
    let server = server();
    server.put("once".to_owned(), "only".to_owned()).unwrap();
    server.del("once").unwrap();
    assert!(matches!(server.del("once"), Err(KvsError::NoSuchKey)));
}

#[test]
fn values_survive_eviction_from_a_tiny_cache() {
    let server = KvServer::new(1, 2);
    for i in 0..20 {
        server.put(format!("key{}", i), format!("value{}", i)).unwrap();
    }
    assert!(server.cache().len() <= 2);
    for i in 0..20 {
        assert_eq!(server.get(&format!("key{}", i)).unwrap(), format!("value{}", i));
    }
}

#[test]
fn fuzz() {
    let server = server();
    let mut rng = SmallRng::seed_from_u64(8);
    let mut expected = HashMap::with_capacity(10_000);
    for _ in 0..10_000 {
        let key = rng.gen::<i32>().to_string();
        let value = rng.gen::<i32>().to_string();
        server.put(key.clone(), value.clone()).unwrap();
        expected.insert(key, value);
    }

    for (key, value) in expected.drain() {
        assert!(server.has_key(&key).unwrap());
        assert_eq!(server.get(&key).unwrap(), value);
    }
    assert!(expected.is_empty());
}

#[test]
fn single_threaded_sequences_match_a_model() {
    let server = KvServer::new(3, 2);
    let mut rng = SmallRng::seed_from_u64(162);
    let mut model: HashMap<String, String> = HashMap::new();
    for i in 0..5_000 {
        let key = format!("k{}", rng.gen_range(0..40));
        match rng.gen_range(0..3) {
            0 => {
                let value = format!("v{}", i);
                server.put(key.clone(), value.clone()).unwrap();
                model.insert(key, value);
            }
            1 => match model.get(&key) {
                Some(value) => assert_eq!(&server.get(&key).unwrap(), value),
                None => assert!(matches!(server.get(&key), Err(KvsError::NoSuchKey))),
            },
            _ => match model.remove(&key) {
                Some(_) => server.del(&key).unwrap(),
                None => assert!(matches!(server.del(&key), Err(KvsError::NoSuchKey))),
            },
        }
        let snapshot = server.cache_snapshot();
        assert!(snapshot.sets.iter().all(|s| s.entries.len() <= 2));
    }
}

#[test]
fn concurrent_writers_on_disjoint_keys() {
    let server = KvServer::new(4, 4);
    thread::scope(|s| {
        for t in 0..8 {
            let server = server.clone();
            s.spawn(move |_| {
                for i in 0..500 {
                    let key = format!("t{}-k{}", t, i % 50);
                    server.put(key.clone(), format!("{}", i)).unwrap();
                    assert_eq!(server.get(&key).unwrap(), format!("{}", i));
                }
            });
        }
    })
    .unwrap();

    for t in 0..8 {
        for k in 0..50 {
            // the last write to key k was i = 450 + k
            let key = format!("t{}-k{}", t, k);
            assert_eq!(server.get(&key).unwrap(), format!("{}", 450 + k));
        }
    }
    assert!(server.cache().len() <= 16);
}

#[test]
fn concurrent_readers_of_one_key_agree_with_the_store() {
    let server = KvServer::new(1, 1);
    server.put("shared".to_owned(), "value".to_owned()).unwrap();
    thread::scope(|s| {
        for t in 0..4 {
            let server = server.clone();
            s.spawn(move |_| {
                for i in 0..200 {
                    // keep evicting "shared" so readers take the miss path
                    let other = format!("other-{}-{}", t, i);
                    server.put(other, "x".to_owned()).unwrap();
                    assert_eq!(server.get("shared").unwrap(), "value");
                }
            });
        }
    })
    .unwrap();
}
