use std::time::Duration;

use super::RttHistory;

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

#[test]
fn test_empty_history_reports_zero() {
    let history = RttHistory::new(4);
    assert!(history.is_empty());
    assert_eq!(history.mean(3), Duration::ZERO);
    assert_eq!(history.latest(), None);
}

#[test]
fn test_oldest_sample_is_evicted_first() {
    let mut history = RttHistory::new(3);
    for v in [10, 20, 30, 40, 50] {
        history.push(ms(v));
    }

    assert_eq!(history.len(), 3);
    let kept: Vec<_> = history.iter().copied().collect();
    assert_eq!(kept, vec![ms(30), ms(40), ms(50)]);
    assert_eq!(history.latest(), Some(ms(50)));
}

#[test]
fn test_mean_over_newest_window() {
    let mut history = RttHistory::new(10);
    for v in [100, 200, 300, 400] {
        history.push(ms(v));
    }

    assert_eq!(history.mean(1), ms(400));
    assert_eq!(history.mean(2), ms(350));
    // larger than the sample count uses every sample
    assert_eq!(history.mean(100), ms(250));
    // zero behaves like one
    assert_eq!(history.mean(0), ms(400));
}

#[test]
fn test_zero_capacity_keeps_one_sample() {
    let mut history = RttHistory::new(0);
    history.push(ms(1));
    history.push(ms(2));
    assert_eq!(history.capacity(), 1);
    assert_eq!(history.len(), 1);
    assert_eq!(history.latest(), Some(ms(2)));
}
