//! Period state machine: which transitions are legal and what each one implies.

use thiserror::Error;

use super::{
    clock::{ClockPhase, ClockState},
    model::{Game, GameStatus},
};

/// Period-level transitions requested by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodTransition {
    /// Begin the given period.
    Start(u8),
    /// End the period in play.
    End,
}

/// Error returned when a period transition cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidPeriodTransition {
    /// The requested period is outside the schedule.
    #[error("period {requested} does not exist (last period is {last})")]
    OutOfRange {
        /// Requested period.
        requested: u8,
        /// Highest valid period.
        last: u8,
    },
    /// Periods only start while the clock is idle.
    #[error("cannot apply {transition:?} while the clock is {phase:?}")]
    ClockActive {
        /// Rejected transition.
        transition: PeriodTransition,
        /// Clock phase at the time.
        phase: ClockPhase,
    },
    /// The game is not live.
    #[error("cannot apply {transition:?} while the game is {status}")]
    NotLive {
        /// Rejected transition.
        transition: PeriodTransition,
        /// Game status at the time.
        status: GameStatus,
    },
}

/// A validated period transition ready to be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodPlan {
    /// Period in play before the transition.
    pub from: u8,
    /// Period in play after the transition.
    pub to: u8,
    /// Transition that produced the plan.
    pub transition: PeriodTransition,
    /// Game time the clock must be moved forward to, if behind the period start.
    pub align_game_time: Option<u32>,
    /// Whether applying the plan is a sync checkpoint.
    pub sync_checkpoint: bool,
}

/// Validate `transition` against the game and clock, producing the plan to apply.
pub fn plan(
    game: &Game,
    clock: &ClockState,
    transition: PeriodTransition,
) -> Result<PeriodPlan, InvalidPeriodTransition> {
    if game.status != GameStatus::Live {
        return Err(InvalidPeriodTransition::NotLive {
            transition,
            status: game.status,
        });
    }

    let from = game.current_period;
    match transition {
        PeriodTransition::Start(requested) => {
            if !game.schedule.contains(requested) {
                return Err(InvalidPeriodTransition::OutOfRange {
                    requested,
                    last: game.schedule.last_period(),
                });
            }

            let phase = clock.phase();
            if phase != ClockPhase::Idle {
                return Err(InvalidPeriodTransition::ClockActive { transition, phase });
            }

            let period_start = game.schedule.period_start_secs(requested);
            Ok(PeriodPlan {
                from,
                to: requested,
                transition,
                align_game_time: (clock.game_time < period_start).then_some(period_start),
                sync_checkpoint: false,
            })
        }
        PeriodTransition::End => Ok(PeriodPlan {
            from,
            to: from,
            transition,
            align_game_time: None,
            sync_checkpoint: from == 1,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::engine::model::GameSchedule;

    fn live_game(periods: u8, has_overtime: bool) -> Game {
        let mut game = Game::new(
            "game-1",
            "home",
            "away",
            GameSchedule {
                periods,
                period_minutes: 10,
                has_overtime,
            },
        );
        game.status = GameStatus::Live;
        game
    }

    #[test]
    fn starting_a_period_aligns_the_clock_forward() {
        let game = live_game(2, false);
        let mut clock = ClockState::default();
        clock.set(500);

        let plan = plan(&game, &clock, PeriodTransition::Start(2)).unwrap();
        assert_eq!(plan.to, 2);
        assert_eq!(plan.align_game_time, Some(600));

        clock.set(650);
        let plan = super::plan(&game, &clock, PeriodTransition::Start(2)).unwrap();
        assert_eq!(plan.align_game_time, None);
    }

    #[test]
    fn overtime_requires_a_schedule_that_has_one() {
        let clock = ClockState::default();
        let err = plan(&live_game(2, false), &clock, PeriodTransition::Start(3)).unwrap_err();
        assert_eq!(
            err,
            InvalidPeriodTransition::OutOfRange {
                requested: 3,
                last: 2
            }
        );
        assert!(plan(&live_game(2, true), &clock, PeriodTransition::Start(3)).is_ok());
    }

    #[test]
    fn periods_only_start_while_idle() {
        let game = live_game(3, false);
        let mut clock = ClockState::default();
        clock.start(SystemTime::now());

        match plan(&game, &clock, PeriodTransition::Start(2)) {
            Err(InvalidPeriodTransition::ClockActive { phase, .. }) => {
                assert_eq!(phase, ClockPhase::Running)
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn ending_period_one_is_a_checkpoint() {
        let mut game = live_game(3, false);
        let clock = ClockState::default();
        assert!(plan(&game, &clock, PeriodTransition::End).unwrap().sync_checkpoint);

        game.current_period = 2;
        assert!(!plan(&game, &clock, PeriodTransition::End).unwrap().sync_checkpoint);
    }

    #[test]
    fn transitions_require_a_live_game() {
        let mut game = live_game(3, false);
        game.status = GameStatus::Planned;
        let err = plan(&game, &ClockState::default(), PeriodTransition::End).unwrap_err();
        assert!(matches!(err, InvalidPeriodTransition::NotLive { .. }));
    }
}
