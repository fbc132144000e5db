use super::*;
use std::sync::atomic::AtomicUsize;
use std::time::Duration;

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "scenemix_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

#[test]
fn second_ensure_is_a_hit() {
    let tmp = temp_dir("cache_hit");
    let cache = AssetCache::new(&tmp, "opus");
    let key = AssetKey::voice("hello");
    let calls = AtomicUsize::new(0);

    let gen_once = |text: &str, hint: Option<f64>| {
        calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(text, "hello");
        assert_eq!(hint, None);
        Ok(b"audio".to_vec())
    };
    let a = cache.ensure(&key, None, gen_once).unwrap();
    let b = cache
        .ensure(&key, None, |_, _| panic!("generator must not run on a hit"))
        .unwrap();

    assert_eq!(a, b);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(std::fs::read(&a).unwrap(), b"audio");
    assert_eq!(
        cache.stats(),
        CacheStats {
            hits: 1,
            generated: 1,
        }
    );
    assert!(a.starts_with(tmp.join("voice")));

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn namespaces_do_not_share_files() {
    let tmp = temp_dir("cache_namespaces");
    let cache = AssetCache::new(&tmp, "opus");
    let voice = cache
        .ensure(&AssetKey::voice("rain"), None, |_, _| Ok(b"v".to_vec()))
        .unwrap();
    let sound = cache
        .ensure(&AssetKey::sound("rain"), Some(2.0), |_, _| Ok(b"s".to_vec()))
        .unwrap();
    assert_ne!(voice, sound);
    assert_eq!(cache.stats().generated, 2);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn failed_generation_leaves_no_file() {
    let tmp = temp_dir("cache_failure");
    let cache = AssetCache::new(&tmp, "opus");
    let key = AssetKey::sound("thunder");

    let err = cache
        .ensure(&key, Some(1.0), |_, _| Err(SceneError::cancelled("generate")))
        .unwrap_err();
    assert!(err.is_cancelled());
    assert!(cache.lookup(&key).is_none());

    let err = cache
        .ensure(&key, Some(1.0), |_, _| Ok(Vec::new()))
        .unwrap_err();
    assert!(err.to_string().contains("no bytes"));
    assert!(cache.lookup(&key).is_none());

    let leftovers: Vec<_> = std::fs::read_dir(tmp.join("sound"))
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn concurrent_requests_generate_once() {
    let tmp = temp_dir("cache_single_flight");
    let cache = AssetCache::new(&tmp, "opus");
    let key = AssetKey::sound("crowd murmur");
    let calls = AtomicUsize::new(0);

    let paths: Vec<PathBuf> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    cache
                        .ensure(&key, None, |_, _| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(Duration::from_millis(50));
                            Ok(b"murmur".to_vec())
                        })
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(paths.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(cache.stats().hits, 7);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn existing_files_from_a_previous_run_are_reused() {
    let tmp = temp_dir("cache_reuse");
    let key = AssetKey::voice("welcome back");
    {
        let first = AssetCache::new(&tmp, "opus");
        first.ensure(&key, None, |_, _| Ok(b"x".to_vec())).unwrap();
    }
    let second = AssetCache::new(&tmp, "opus");
    assert!(second.lookup(&key).is_some());
    second
        .ensure(&key, None, |_, _| panic!("must reuse existing asset"))
        .unwrap();
    assert_eq!(second.stats().generated, 0);

    std::fs::remove_dir_all(&tmp).ok();
}
