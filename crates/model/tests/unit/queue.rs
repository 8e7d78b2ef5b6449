//! # Queueing Formula Tests
//!
//! Checks the closed forms against hand values, a brute-force birth-death
//! chain, and the unbounded limit of the bounded queue.

use ipcq_core::queue::{self, bounded, unbounded};
use proptest::prelude::*;
use rstest::rstest;

use crate::common::harness::{assert_close, brute_force_mm1k};

#[rstest]
#[case(0.0, 0.0)]
#[case(0.25, 1.0 / 3.0)]
#[case(0.5, 1.0)]
#[case(0.8, 4.0)]
fn test_unbounded_queue_length(#[case] rho: f64, #[case] expected: f64) {
    assert_close(unbounded::queue_length(rho), expected, 1e-12);
}

#[test]
fn test_unbounded_wait_time() {
    assert_close(unbounded::wait_time(2.0, 0.5), 4.0, 1e-12);
    assert_close(unbounded::wait_time(7.0, 0.35), 7.0 / 0.65, 1e-12);
}

#[rstest]
#[case(1.0)]
#[case(1.5)]
#[case(40.0)]
fn test_saturated_unbounded_metrics_are_infinite(#[case] rho: f64) {
    assert_eq!(unbounded::queue_length(rho), f64::INFINITY);
    assert_eq!(unbounded::wait_time(3.0, rho), f64::INFINITY);
    assert!(!unbounded::queue_length(rho).is_nan());
}

#[test]
fn test_reported_utilization_is_capped_but_load_is_not() {
    assert_eq!(queue::utilization(1.0, 2.0), 0.999);
    assert_eq!(queue::offered_load(1.0, 2.0), 2.0);
    assert_close(queue::utilization(0.05, 4.0), 0.2, 1e-15);
}

#[test]
fn test_stability_boundary() {
    assert!(queue::is_stable(0.2, 4.999));
    assert!(!queue::is_stable(0.2, 5.0));
    assert!(!queue::is_stable(0.25, 5.0));
}

#[test]
fn test_response_time_adds_service() {
    assert_eq!(queue::response_time(2.5, 4.0), 6.5);
}

#[test]
fn test_bounded_matches_brute_force_chain() {
    assert_close(bounded::queue_length(0.6, 6), brute_force_mm1k(0.6, 6), 1e-6);
}

#[rstest]
#[case(0.1, 3)]
#[case(0.45, 10)]
#[case(0.9, 4)]
#[case(0.99, 25)]
fn test_bounded_matches_brute_force_across_loads(#[case] rho: f64, #[case] capacity: u32) {
    assert_close(
        bounded::queue_length(rho, capacity),
        brute_force_mm1k(rho, capacity),
        1e-6,
    );
}

#[test]
fn test_bounded_unit_load_substitutes_half_capacity() {
    assert_eq!(bounded::queue_length(1.0, 6), 3.0);
    assert_close(bounded::queue_length(1.0 - 1e-10, 6), 3.0, 1e-8);
}

#[rstest]
#[case(1e-3, 6)]
#[case(1e-5, 6)]
#[case(1e-7, 6)]
#[case(3e-8, 6)]
#[case(1e-8, 6)]
#[case(3e-9, 6)]
#[case(2e-9, 6)]
#[case(1e-8, 1)]
#[case(1e-8, 63)]
fn test_bounded_just_below_unit_load_matches_chain(#[case] gap: f64, #[case] capacity: u32) {
    let rho = 1.0 - gap;
    assert_close(
        bounded::queue_length(rho, capacity),
        brute_force_mm1k(rho, capacity),
        1e-6,
    );
}

#[test]
fn test_bounded_overload_is_half_full_and_fully_utilized() {
    assert_eq!(bounded::queue_length(1.8, 6), 3.0);
    assert_eq!(bounded::utilization(0.6, 3.0), 1.0);
}

#[test]
fn test_bounded_wait_time_by_littles_law() {
    assert_eq!(bounded::wait_time(3.0, 0.0), 0.0);
    assert_close(bounded::wait_time(1.2, 0.3), 4.0, 1e-12);
}

proptest! {
    #[test]
    fn prop_large_capacity_converges_to_unbounded(rho in 0.01f64..0.9) {
        let bounded_l = bounded::queue_length(rho, 500);
        let unbounded_l = unbounded::queue_length(rho);
        prop_assert!((bounded_l - unbounded_l).abs() <= 1e-6 * unbounded_l.max(1.0));
    }

    #[test]
    fn prop_bounded_near_unit_load_tracks_chain(gap in 1e-12f64..1e-2, capacity in 1u32..64) {
        let rho = 1.0 - gap;
        let l = bounded::queue_length(rho, capacity);
        prop_assert!((l - brute_force_mm1k(rho, capacity)).abs() <= 1e-6);
    }

    #[test]
    fn prop_bounded_length_within_capacity(rho in 0.0f64..3.0, capacity in 1u32..64) {
        let l = bounded::queue_length(rho, capacity);
        prop_assert!(l >= 0.0);
        prop_assert!(l <= f64::from(capacity));
    }
}
