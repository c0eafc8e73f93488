//! Game clock and the single-slot timer handle driving it.
//!
//! The clock itself is plain data mutated under the engine lock. The repeating
//! one-second task lives in [`TimerSlot`], which guarantees at most one ticking
//! timer per engine: every (re)start cancels the previous handle first, and
//! ticks carrying a stale generation are ignored.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tokio::task::AbortHandle;
use utoipa::ToSchema;

use super::model::GameSchedule;

/// Observable state of the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ClockPhase {
    /// Not tracking.
    Idle,
    /// Tracking and counting.
    Running,
    /// Tracking but stopped; ticks are no-ops.
    Paused,
}

/// Elapsed game time and tracking flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockState {
    /// Seconds elapsed since game start.
    pub game_time: u32,
    /// Whether the clock is tracking.
    pub is_tracking: bool,
    /// Whether tracking is paused. Meaningless unless `is_tracking`.
    pub is_paused: bool,
    /// Wall-clock anchor taken when tracking last started.
    pub period_start_time: Option<SystemTime>,
}

/// Result of applying one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The clock was idle or paused; nothing changed.
    Skipped,
    /// Game time advanced to the contained value.
    Advanced {
        /// New game time.
        game_time: u32,
    },
    /// Game time advanced and the period ran out; the clock is now idle.
    PeriodExpired {
        /// New game time.
        game_time: u32,
    },
}

impl ClockState {
    /// Current phase derived from the tracking flags.
    pub fn phase(&self) -> ClockPhase {
        match (self.is_tracking, self.is_paused) {
            (false, _) => ClockPhase::Idle,
            (true, false) => ClockPhase::Running,
            (true, true) => ClockPhase::Paused,
        }
    }

    /// Seconds elapsed in `period`, negative when the clock sits before its start.
    pub fn period_elapsed(&self, schedule: &GameSchedule, period: u8) -> i64 {
        i64::from(self.game_time) - i64::from(schedule.period_start_secs(period))
    }

    /// Begin tracking. Only valid from idle.
    pub(crate) fn start(&mut self, now: SystemTime) -> bool {
        if self.phase() != ClockPhase::Idle {
            return false;
        }
        self.is_tracking = true;
        self.is_paused = false;
        self.period_start_time = Some(now);
        true
    }

    pub(crate) fn pause(&mut self) -> bool {
        if self.phase() != ClockPhase::Running {
            return false;
        }
        self.is_paused = true;
        true
    }

    pub(crate) fn resume(&mut self) -> bool {
        if self.phase() != ClockPhase::Paused {
            return false;
        }
        self.is_paused = false;
        true
    }

    /// Return to idle, keeping the elapsed time.
    pub(crate) fn stop(&mut self) {
        self.is_tracking = false;
        self.is_paused = false;
    }

    /// Shift game time by `delta` seconds, clamped at zero.
    pub(crate) fn adjust(&mut self, delta: i64) -> u32 {
        self.set(i64::from(self.game_time).saturating_add(delta))
    }

    /// Set game time to `seconds`, clamped at zero.
    pub(crate) fn set(&mut self, seconds: i64) -> u32 {
        self.game_time = u32::try_from(seconds.max(0)).unwrap_or(u32::MAX);
        self.game_time
    }

    /// Advance by one second and evaluate the period boundary against the new value.
    pub(crate) fn tick(&mut self, schedule: &GameSchedule, current_period: u8) -> TickOutcome {
        if self.phase() != ClockPhase::Running {
            return TickOutcome::Skipped;
        }

        self.game_time = self.game_time.saturating_add(1);
        let elapsed = self.period_elapsed(schedule, current_period);
        if elapsed >= i64::from(schedule.period_length_secs()) {
            self.stop();
            TickOutcome::PeriodExpired {
                game_time: self.game_time,
            }
        } else {
            TickOutcome::Advanced {
                game_time: self.game_time,
            }
        }
    }
}

#[derive(Debug)]
struct ActiveTimer {
    generation: u64,
    handle: AbortHandle,
}

/// Owner of the one ticking task an engine may have.
#[derive(Debug, Default)]
pub struct TimerSlot {
    generation: u64,
    active: Option<ActiveTimer>,
}

impl TimerSlot {
    /// Cancel whatever is installed and reserve the generation for the next timer.
    pub fn rearm(&mut self) -> u64 {
        self.cancel();
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }

    /// Install the handle of the task spawned for `generation`.
    ///
    /// A handle for an outdated generation is aborted immediately.
    pub fn install(&mut self, generation: u64, handle: AbortHandle) {
        if generation != self.generation {
            handle.abort();
            return;
        }
        self.cancel();
        self.active = Some(ActiveTimer { generation, handle });
    }

    /// Abort the installed task, if any. Returns whether one was running.
    pub fn cancel(&mut self) -> bool {
        match self.active.take() {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Whether a tick from `generation` belongs to the installed timer.
    pub fn is_current(&self, generation: u64) -> bool {
        self.active
            .as_ref()
            .is_some_and(|timer| timer.generation == generation)
    }

    /// Whether a timer is installed.
    pub fn is_armed(&self) -> bool {
        self.active.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_minute_periods() -> GameSchedule {
        GameSchedule {
            periods: 3,
            period_minutes: 1,
            has_overtime: false,
        }
    }

    fn running_clock() -> ClockState {
        let mut clock = ClockState::default();
        assert!(clock.start(SystemTime::now()));
        clock
    }

    #[test]
    fn start_is_only_valid_from_idle() {
        let mut clock = running_clock();
        assert!(!clock.start(SystemTime::now()));
        clock.pause();
        assert!(!clock.start(SystemTime::now()));
        clock.stop();
        assert!(clock.start(SystemTime::now()));
    }

    #[test]
    fn period_expires_on_exactly_the_sixtieth_tick() {
        let schedule = one_minute_periods();
        let mut clock = running_clock();

        let mut expirations = 0;
        for _ in 0..59 {
            match clock.tick(&schedule, 1) {
                TickOutcome::Advanced { .. } => {}
                other => panic!("unexpected outcome before boundary: {other:?}"),
            }
        }
        assert_eq!(clock.game_time, 59);
        assert!(clock.is_tracking);

        if let TickOutcome::PeriodExpired { game_time } = clock.tick(&schedule, 1) {
            expirations += 1;
            assert_eq!(game_time, 60);
        }
        assert_eq!(clock.tick(&schedule, 1), TickOutcome::Skipped);

        assert_eq!(expirations, 1);
        assert_eq!(clock.game_time, 60);
        assert_eq!(clock.phase(), ClockPhase::Idle);
    }

    #[test]
    fn boundary_uses_the_current_period_offset() {
        let schedule = one_minute_periods();
        let mut clock = running_clock();
        clock.set(60);

        for _ in 0..59 {
            clock.tick(&schedule, 2);
        }
        assert_eq!(clock.game_time, 119);
        assert_eq!(
            clock.tick(&schedule, 2),
            TickOutcome::PeriodExpired { game_time: 120 }
        );
    }

    #[test]
    fn paused_ticks_do_not_advance_time() {
        let schedule = one_minute_periods();
        let mut clock = running_clock();
        clock.tick(&schedule, 1);
        assert!(clock.pause());
        assert_eq!(clock.tick(&schedule, 1), TickOutcome::Skipped);
        assert_eq!(clock.game_time, 1);
        assert!(clock.resume());
        clock.tick(&schedule, 1);
        assert_eq!(clock.game_time, 2);
    }

    #[test]
    fn pause_and_resume_require_the_matching_phase() {
        let mut clock = ClockState::default();
        assert!(!clock.pause());
        assert!(!clock.resume());
        clock.start(SystemTime::now());
        assert!(!clock.resume());
        assert!(clock.pause());
        assert!(!clock.pause());
    }

    #[test]
    fn manual_adjustments_clamp_at_zero() {
        let mut clock = ClockState::default();
        assert_eq!(clock.adjust(30), 30);
        assert_eq!(clock.adjust(-45), 0);
        assert_eq!(clock.set(-10), 0);
        assert_eq!(clock.set(125), 125);
    }

    #[tokio::test]
    async fn rearming_aborts_the_previous_timer() {
        let mut slot = TimerSlot::default();

        let first_generation = slot.rearm();
        let first = tokio::spawn(std::future::pending::<()>());
        slot.install(first_generation, first.abort_handle());
        assert!(slot.is_current(first_generation));

        let second_generation = slot.rearm();
        assert!(!slot.is_current(first_generation));
        assert!(first.await.unwrap_err().is_cancelled());

        let second = tokio::spawn(std::future::pending::<()>());
        slot.install(second_generation, second.abort_handle());
        assert!(slot.is_armed());
        assert!(slot.cancel());
        assert!(!slot.is_armed());
        assert!(second.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn stale_handles_are_aborted_on_install() {
        let mut slot = TimerSlot::default();
        let stale_generation = slot.rearm();
        slot.rearm();

        let stale = tokio::spawn(std::future::pending::<()>());
        slot.install(stale_generation, stale.abort_handle());
        assert!(!slot.is_armed());
        assert!(stale.await.unwrap_err().is_cancelled());
    }
}
