use std::time::Duration;

use crate::scheduler::{AdaptiveScheduler, Phase};

const FAST: Duration = Duration::from_millis(1000);
const SLOW: Duration = Duration::from_millis(5000);

#[test]
fn starts_characterizing_at_initial_interval() {
    let scheduler = AdaptiveScheduler::new(FAST, SLOW);
    assert_eq!(scheduler.phase(), Phase::Characterizing);
    assert_eq!(scheduler.current_interval(), FAST);
}

#[test]
fn walks_through_all_phases() {
    // Arrange
    let mut scheduler = AdaptiveScheduler::new(FAST, SLOW);

    // Act / Assert
    assert_eq!(scheduler.next_delay(false, false), FAST);
    assert_eq!(scheduler.next_delay(true, false), SLOW);
    assert_eq!(scheduler.phase(), Phase::SteadyState);

    assert_eq!(scheduler.next_delay(false, true), FAST);
    assert_eq!(scheduler.phase(), Phase::HardFailure);

    assert_eq!(scheduler.next_delay(false, false), FAST);
    assert_eq!(scheduler.phase(), Phase::Characterizing);
}

#[test]
fn hard_failure_wins_over_saturation() {
    let mut scheduler = AdaptiveScheduler::new(FAST, SLOW);
    assert_eq!(scheduler.next_delay(true, true), FAST);
    assert_eq!(scheduler.phase(), Phase::HardFailure);
}
