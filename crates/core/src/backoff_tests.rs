// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[test]
fn default_schedule_doubles_from_one_second() {
    let backoff = Backoff::default();
    assert_eq!(backoff.schedule(), vec![ms(1000), ms(2000), ms(4000)]);
}

#[test]
fn fourth_failure_has_no_delay() {
    let backoff = Backoff::default();
    assert_eq!(backoff.delay_for(4), None);
    assert_eq!(backoff.delay_for(0), None);
}

#[yare::parameterized(
    first   = { 1, 500 },
    second  = { 2, 1000 },
    fourth  = { 4, 4000 },
    capped  = { 5, 5000 },
    still   = { 9, 5000 },
)]
fn delay_is_capped_at_max(attempt: u32, expected_ms: u64) {
    let backoff = Backoff::new(ms(500), ms(5000), 10);
    assert_eq!(backoff.delay_for(attempt), Some(ms(expected_ms)));
}

#[test]
fn huge_attempt_counts_do_not_overflow() {
    let backoff = Backoff::new(ms(1000), ms(10_000), u32::MAX);
    assert_eq!(backoff.delay_for(200), Some(ms(10_000)));
}
