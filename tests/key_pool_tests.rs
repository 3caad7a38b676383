// tests/key_pool_tests.rs

mod common;

use common::{draw, TestPoolBuilder, BREAKER_COOLDOWN, RATE_LIMIT_COOLDOWN, SWEEP_INTERVAL};
use provider_key_pool::pool::UpstreamFailure;
use std::time::Duration;

const K1: &str = "brave-key-aaaaaaaa";
const K2: &str = "brave-key-bbbbbbbb";
const K3: &str = "brave-key-cccccccc";

#[test]
fn test_round_robin_cycles_through_all_keys() {
    let (pool, _) = TestPoolBuilder::new(&[K1, K2, K3]).build();
    assert_eq!(draw(&pool, 6), vec![K1, K2, K3, K1, K2, K3]);

    let uses: Vec<u64> = pool.get_key_statuses().iter().map(|s| s.total_uses).collect();
    assert_eq!(uses, vec![2, 2, 2]);
}

#[test]
fn test_initial_state() {
    let (pool, _) = TestPoolBuilder::new(&[K1, K2, K3]).build();
    let stats = pool.get_usage_stats();
    assert_eq!(stats.total_keys, 3);
    assert_eq!(stats.healthy_keys, 3);
    assert_eq!(stats.active_keys, 3);
    assert_eq!(stats.rate_limited_keys, 0);
    assert_eq!(stats.circuit_broken_keys, 0);
    assert_eq!(stats.average_response_time, 0.0);
}

#[test]
fn test_blank_keys_are_filtered() {
    let (pool, _) = TestPoolBuilder::new(&["validKey123", "", "  ", "anotherKey456"]).build();
    assert_eq!(pool.key_count(), 2);
    assert_eq!(pool.get_usage_stats().healthy_keys, 2);
}

#[test]
fn test_empty_pool_yields_no_key() {
    let (pool, _) = TestPoolBuilder::new(&[]).build();
    assert_eq!(pool.get_next_key(), None);
    assert_eq!(pool.get_usage_stats().total_keys, 0);
}

#[test]
fn test_success_resets_failure_count() {
    let (pool, _) = TestPoolBuilder::new(&[K1]).build();
    pool.report_failure(K1, "500 internal error", None);
    pool.report_failure(K1, "500 internal error", None);
    assert_eq!(pool.get_key_statuses()[0].consecutive_failures, 2);

    pool.report_success(K1, Duration::from_millis(80));
    let status = &pool.get_key_statuses()[0];
    assert_eq!(status.consecutive_failures, 0);
    assert!(status.is_healthy);
    assert_eq!(status.total_failures, 2);
}

#[test]
fn test_circuit_breaker_trips_after_threshold() {
    let (pool, clock) = TestPoolBuilder::new(&[K1, K2]).max_failures(3).build();
    for _ in 0..3 {
        pool.report_failure(K1, "upstream exploded", None);
    }

    let status = &pool.get_key_statuses()[0];
    assert!(!status.is_healthy);
    assert!(status.circuit_breaker_until.is_some());
    assert!(draw(&pool, 10).iter().all(|k| k == K2));

    clock.advance(BREAKER_COOLDOWN);
    let keys = draw(&pool, 4);
    assert!(keys.iter().any(|k| k == K1));
}

#[test]
fn test_auth_error_trips_immediately() {
    let (pool, _) = TestPoolBuilder::new(&[K1, K2]).build();
    pool.report_failure(K1, "HTTP 401 from upstream", None);

    let status = &pool.get_key_statuses()[0];
    assert_eq!(status.consecutive_failures, 1);
    assert!(status.circuit_breaker_until.is_some());
    assert!(!status.is_healthy);
    assert_eq!(pool.get_usage_stats().circuit_broken_keys, 1);
}

#[test]
fn test_rate_limit_is_exclusive() {
    let (pool, _) = TestPoolBuilder::new(&[K1, K2]).max_failures(2).build();
    for _ in 0..3 {
        pool.report_failure(K1, "429 Too Many Requests", None);
    }

    let status = &pool.get_key_statuses()[0];
    assert_eq!(status.consecutive_failures, 3);
    assert!(status.rate_limited_until.is_some());
    assert!(status.circuit_breaker_until.is_none());
    assert!(status.is_healthy);

    let stats = pool.get_usage_stats();
    assert_eq!(stats.rate_limited_keys, 1);
    assert_eq!(stats.circuit_broken_keys, 0);
    assert_eq!(stats.active_keys, 1);
}

#[test]
fn test_rate_limit_lifts_after_cooldown() {
    let (pool, clock) = TestPoolBuilder::new(&[K1]).build();
    pool.report_failure(K1, UpstreamFailure::new("quota exceeded for today"), None);
    assert_eq!(pool.get_next_key(), None);

    clock.advance(RATE_LIMIT_COOLDOWN);
    assert_eq!(pool.get_next_key().as_deref(), Some(K1));
    assert!(pool.get_key_statuses()[0].rate_limited_until.is_none());
}

#[test]
fn test_recovery_halves_failures() {
    let (pool, clock) = TestPoolBuilder::new(&[K1]).max_failures(3).build();
    for _ in 0..7 {
        pool.report_failure(K1, "connection reset", None);
    }
    assert_eq!(pool.get_key_statuses()[0].consecutive_failures, 7);

    clock.advance(BREAKER_COOLDOWN);
    assert_eq!(pool.get_next_key().as_deref(), Some(K1));

    let status = &pool.get_key_statuses()[0];
    assert_eq!(status.consecutive_failures, 3);
    assert!(status.is_healthy);
    assert!(status.circuit_breaker_until.is_none());
}

#[test]
fn test_exhaustion_until_recovery() {
    let (pool, clock) = TestPoolBuilder::new(&[K1]).build();
    pool.report_failure(K1, "invalid api key", None);

    for _ in 0..5 {
        assert_eq!(pool.get_next_key(), None);
        clock.advance(Duration::from_secs(30));
    }
    assert_eq!(pool.get_usage_stats().active_keys, 0);

    clock.advance(BREAKER_COOLDOWN);
    assert_eq!(pool.get_next_key().as_deref(), Some(K1));
}

#[test]
fn test_success_clears_open_breaker() {
    let (pool, _) = TestPoolBuilder::new(&[K1]).build();
    pool.report_failure(K1, "403 Forbidden", None);
    assert_eq!(pool.get_next_key(), None);

    pool.report_success(K1, Duration::from_millis(50));
    let status = &pool.get_key_statuses()[0];
    assert!(status.circuit_breaker_until.is_none());
    assert!(status.is_healthy);
    assert_eq!(pool.get_next_key().as_deref(), Some(K1));
}

#[test]
fn test_key_statuses_never_expose_raw_keys() {
    let (pool, _) = TestPoolBuilder::new(&[K1, K2, "short"]).build();
    let statuses = pool.get_key_statuses();
    let json = serde_json::to_string(&statuses).unwrap();

    for raw in [K1, K2] {
        assert!(!json.contains(raw));
    }
    let ids: Vec<&str> = statuses.iter().map(|s| s.key_id.as_str()).collect();
    assert_eq!(ids, vec!["brave-ke...", "brave-ke...", "short..."]);
}

#[test]
fn test_moving_average() {
    let (pool, _) = TestPoolBuilder::new(&[K1]).build();
    pool.report_success(K1, Duration::from_millis(100));
    pool.report_success(K1, Duration::from_millis(200));
    let avg = pool.get_key_statuses()[0].average_response_time;
    assert!((avg - 120.0).abs() < 1e-9, "average was {avg}");
}

#[test]
fn test_usage_stats_average_ignores_idle_keys() {
    let (pool, _) = TestPoolBuilder::new(&[K1, K2, K3]).build();
    pool.report_success(K1, Duration::from_millis(100));
    pool.report_success(K2, Duration::from_millis(300));

    let stats = pool.get_usage_stats();
    assert!((stats.average_response_time - 200.0).abs() < 1e-9);
}

#[test]
fn test_end_to_end_scenario() {
    let (pool, clock) = TestPoolBuilder::new(&["k1", "k2"]).max_failures(2).build();

    assert_eq!(pool.get_next_key().as_deref(), Some("k1"));
    pool.report_failure("k1", "500 error", None);
    assert_eq!(pool.get_next_key().as_deref(), Some("k2"));
    pool.report_failure("k1", "500 error", None);

    let k1 = &pool.get_key_statuses()[0];
    assert!(k1.circuit_breaker_until.is_some());

    for _ in 0..20 {
        assert_eq!(pool.get_next_key().as_deref(), Some("k2"));
        clock.advance(SWEEP_INTERVAL / 3);
    }

    clock.advance(BREAKER_COOLDOWN);
    let keys = draw(&pool, 2);
    assert!(keys.contains(&"k1".to_string()));
    assert!(keys.contains(&"k2".to_string()));
    assert_eq!(pool.get_key_statuses()[0].consecutive_failures, 1);
}

#[test]
fn test_pool_is_shareable_across_threads() {
    let (pool, _) = TestPoolBuilder::new(&[K1, K2, K3]).build();
    let pool = std::sync::Arc::new(pool);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pool = std::sync::Arc::clone(&pool);
            std::thread::spawn(move || {
                for _ in 0..25 {
                    if let Some(key) = pool.get_next_key() {
                        pool.report_success(&key, Duration::from_millis(10));
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = pool.get_usage_stats();
    assert_eq!(stats.total_uses, 100);
    assert_eq!(stats.healthy_keys, 3);
}
