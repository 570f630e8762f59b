// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Schedule-driven re-partitioning.
//!
//! The [`PartitionScheduler`] owns the cached [`PartitionAssignment`] and
//! re-packs only when the effective budget fraction changes:
//!
//! ```text
//! step s ──► schedule.entry_at(s - 1) ──► fraction
//!                                            │ same as cached?
//!                           yes ◄────────────┴────────────► no
//!                    reuse Arc<assignment>          budget = floor(f × total)
//!                                                   pack, validate, swap in
//! ```
//!
//! The schedule is evaluated at `s - 1`, the number of steps already
//! completed, so a threshold `t` takes effect on training step `t + 1`.
//! Between transitions the very same `Arc` is handed out, so the round-robin
//! cycle in [`crate::SyncSelector`] stays coherent.

use crate::strategy::{tensor_sizes, PackingStrategy, TensorSizes};
use crate::{ByteBudget, FirstFitDecreasing, Fraction, PartitionAssignment, Schedule, ScheduleError};
use std::sync::Arc;
use tensor_core::TensorDescriptor;

/// Fraction to use before the first schedule threshold is reached.
///
/// The integrating system picks this; the scheduler never invents one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InitialFraction {
    /// Use the first declared entry's fraction.
    FirstEntry,
    /// Use a caller-supplied fraction.
    Explicit(f64),
}

/// Result of one [`PartitionScheduler::update`] call.
#[derive(Debug, Clone)]
pub struct ScheduleUpdate {
    pub assignment: Arc<PartitionAssignment>,
    pub fraction: Fraction,
    /// Budget derived from `fraction` when the assignment was packed.
    pub budget: ByteBudget,
    /// `true` if this call produced a new assignment.
    pub repartitioned: bool,
}

/// Scheduler state. Mutated only by [`PartitionScheduler::update`], and only
/// after packing has fully succeeded.
#[derive(Debug, Default)]
pub struct SchedulerState {
    last_step: Option<u64>,
    fraction: Option<Fraction>,
    budget: Option<ByteBudget>,
    sizes: TensorSizes,
    assignment: Option<Arc<PartitionAssignment>>,
    repartitions: u64,
}

impl SchedulerState {
    pub fn last_step(&self) -> Option<u64> {
        self.last_step
    }

    pub fn fraction(&self) -> Option<Fraction> {
        self.fraction
    }

    pub fn budget(&self) -> Option<ByteBudget> {
        self.budget
    }

    pub fn assignment(&self) -> Option<&Arc<PartitionAssignment>> {
        self.assignment.as_ref()
    }

    /// How many times an assignment has been packed.
    pub fn repartitions(&self) -> u64 {
        self.repartitions
    }
}

/// Owns the schedule and the current assignment for one training loop.
///
/// # Example
/// ```
/// use partition_scheduler::{InitialFraction, PartitionScheduler, ScheduleParser};
/// use tensor_core::{DType, Shape, TensorDescriptor};
///
/// let schedule = ScheduleParser::new(32, 3200, 4).unwrap().parse("0:0.5,10:1.0").unwrap();
/// let mut scheduler = PartitionScheduler::new(schedule, InitialFraction::FirstEntry, false).unwrap();
/// let tensors = vec![
///     TensorDescriptor::new("a", DType::F32, Shape::vector(10)).unwrap(),
///     TensorDescriptor::new("b", DType::F32, Shape::vector(10)).unwrap(),
/// ];
/// let update = scheduler.update(1, &tensors).unwrap();
/// assert_eq!(update.assignment.num_partitions(), 2);
/// ```
pub struct PartitionScheduler {
    schedule: Schedule,
    initial: InitialFraction,
    strategy: Box<dyn PackingStrategy>,
    state: SchedulerState,
}

impl PartitionScheduler {
    /// Creates a scheduler packing with [`FirstFitDecreasing`].
    pub fn new(
        schedule: Schedule,
        initial: InitialFraction,
        adjust_budget: bool,
    ) -> Result<Self, ScheduleError> {
        Self::with_strategy(
            schedule,
            initial,
            Box::new(FirstFitDecreasing::with_adjust_budget(adjust_budget)),
        )
    }

    /// Creates a scheduler with a custom packing strategy.
    pub fn with_strategy(
        schedule: Schedule,
        initial: InitialFraction,
        strategy: Box<dyn PackingStrategy>,
    ) -> Result<Self, ScheduleError> {
        match initial {
            InitialFraction::FirstEntry if schedule.is_empty() => {
                return Err(ScheduleError::InvalidConfiguration(
                    "schedule is empty and no initial fraction was given".into(),
                ));
            }
            InitialFraction::Explicit(f) => {
                Fraction::new(f)?;
            }
            InitialFraction::FirstEntry => {}
        }
        tracing::info!(
            "partition scheduler: {} schedule entries, strategy '{}', initial {:?}",
            schedule.len(),
            strategy.name(),
            initial,
        );
        Ok(Self {
            schedule,
            initial,
            strategy,
            state: SchedulerState::default(),
        })
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// The validated fraction in effect at 1-based training step `step`.
    pub fn fraction_at(&self, step: u64) -> Result<Fraction, ScheduleError> {
        let completed = step.checked_sub(1).ok_or_else(|| {
            ScheduleError::InvalidConfiguration("training steps are 1-based; got step 0".into())
        })?;
        let raw = match self.schedule.entry_at(completed) {
            Some(entry) => entry.fraction,
            None => match self.initial {
                InitialFraction::Explicit(f) => f,
                // Non-empty: checked at construction.
                InitialFraction::FirstEntry => self.schedule.entries()[0].fraction,
            },
        };
        Fraction::new(raw)
    }

    /// Brings the assignment up to date for `step` and returns it.
    ///
    /// Re-packs when the effective fraction changed or when the tensor set
    /// differs from the one last packed; otherwise returns the cached
    /// assignment untouched. On error the state is unchanged.
    pub fn update(
        &mut self,
        step: u64,
        tensors: &[TensorDescriptor],
    ) -> Result<ScheduleUpdate, ScheduleError> {
        self.update_sizes(step, tensor_sizes(tensors)?)
    }

    /// Like [`update`](Self::update), for callers that already hold sizes.
    pub fn update_sizes(
        &mut self,
        step: u64,
        sizes: TensorSizes,
    ) -> Result<ScheduleUpdate, ScheduleError> {
        if let Some(last) = self.state.last_step {
            if step < last {
                return Err(ScheduleError::InvalidConfiguration(format!(
                    "global step went backwards: {step} after {last}"
                )));
            }
        }
        let fraction = self.fraction_at(step)?;

        if let (Some(assignment), Some(current), Some(budget)) = (
            &self.state.assignment,
            self.state.fraction,
            self.state.budget,
        ) {
            let same_fraction = current.same_as(fraction);
            let same_tensors = self.state.sizes == sizes;
            if same_fraction && same_tensors {
                let assignment = Arc::clone(assignment);
                self.state.last_step = Some(step);
                tracing::trace!("step {step}: reusing {} partitions", assignment.num_partitions());
                return Ok(ScheduleUpdate {
                    assignment,
                    fraction,
                    budget,
                    repartitioned: false,
                });
            }
            if same_fraction {
                tracing::warn!(
                    "step {step}: tensor set changed ({} → {} tensors); re-packing at fraction {fraction}",
                    self.state.sizes.len(),
                    sizes.len(),
                );
            }
        }

        let total: usize = sizes.values().fold(0usize, |acc, &s| acc.saturating_add(s));
        let budget = ByteBudget::from_fraction(fraction, total);
        let assignment = Arc::new(self.strategy.pack(&sizes, budget)?);

        tracing::info!(
            "step {step}: fraction {} → {fraction}, budget {budget} of {total} bytes, {} partitions",
            self.state
                .fraction
                .map_or_else(|| "none".to_string(), |f| f.to_string()),
            assignment.num_partitions(),
        );

        self.state = SchedulerState {
            last_step: Some(step),
            fraction: Some(fraction),
            budget: Some(budget),
            sizes,
            assignment: Some(Arc::clone(&assignment)),
            repartitions: self.state.repartitions + 1,
        };

        Ok(ScheduleUpdate {
            assignment,
            fraction,
            budget,
            repartitioned: true,
        })
    }
}

impl std::fmt::Debug for PartitionScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionScheduler")
            .field("schedule", &self.schedule)
            .field("initial", &self.initial)
            .field("strategy", &self.strategy.name())
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ScheduleEntry, ScheduleParser, SyncSelector};
    use tensor_core::{DType, Shape};

    fn tensors(sizes: &[(&str, usize)]) -> Vec<TensorDescriptor> {
        sizes
            .iter()
            .map(|&(n, s)| TensorDescriptor::new(n, DType::I8, Shape::vector(s)).unwrap())
            .collect()
    }

    fn abcd() -> Vec<TensorDescriptor> {
        tensors(&[("A", 40), ("B", 30), ("C", 20), ("D", 10)])
    }

    fn schedule(entries: &[(u64, f64)]) -> Schedule {
        Schedule::new(
            entries
                .iter()
                .map(|&(step, fraction)| ScheduleEntry { step, fraction })
                .collect(),
        )
    }

    #[test]
    fn test_first_update_packs() {
        let mut s =
            PartitionScheduler::new(schedule(&[(0, 0.5)]), InitialFraction::FirstEntry, false)
                .unwrap();
        let u = s.update(1, &abcd()).unwrap();
        assert!(u.repartitioned);
        assert_eq!(u.budget.as_bytes(), 50);
        assert_eq!(u.assignment.num_partitions(), 2);
        assert_eq!(s.state().repartitions(), 1);
    }

    #[test]
    fn test_stable_between_transitions() {
        let mut s = PartitionScheduler::new(
            schedule(&[(0, 0.5), (100, 1.0)]),
            InitialFraction::FirstEntry,
            false,
        )
        .unwrap();
        let first = s.update(1, &abcd()).unwrap();
        for step in 2..=100 {
            let u = s.update(step, &abcd()).unwrap();
            assert!(!u.repartitioned, "step {step}");
            assert!(Arc::ptr_eq(&first.assignment, &u.assignment));
        }
        assert_eq!(s.state().repartitions(), 1);
    }

    #[test]
    fn test_transition_takes_effect_after_threshold() {
        let mut s = PartitionScheduler::new(
            schedule(&[(0, 0.5), (10, 1.0)]),
            InitialFraction::FirstEntry,
            false,
        )
        .unwrap();
        for step in 1..=10 {
            assert_eq!(s.update(step, &abcd()).unwrap().assignment.num_partitions(), 2);
        }
        let u = s.update(11, &abcd()).unwrap();
        assert!(u.repartitioned);
        assert_eq!(u.assignment.num_partitions(), 1);
        assert_eq!(s.state().repartitions(), 2);
    }

    #[test]
    fn test_same_fraction_in_next_entry_does_not_repack() {
        let mut s = PartitionScheduler::new(
            schedule(&[(0, 0.5), (5, 0.5)]),
            InitialFraction::FirstEntry,
            false,
        )
        .unwrap();
        s.update(1, &abcd()).unwrap();
        assert!(!s.update(6, &abcd()).unwrap().repartitioned);
    }

    #[test]
    fn test_initial_fraction_before_first_threshold() {
        let sched = schedule(&[(5, 1.0)]);

        let explicit =
            PartitionScheduler::new(sched.clone(), InitialFraction::Explicit(0.5), false).unwrap();
        assert_eq!(explicit.fraction_at(1).unwrap().get(), 0.5);
        assert_eq!(explicit.fraction_at(6).unwrap().get(), 1.0);

        let first = PartitionScheduler::new(sched, InitialFraction::FirstEntry, false).unwrap();
        assert_eq!(first.fraction_at(1).unwrap().get(), 1.0);
    }

    #[test]
    fn test_invalid_construction() {
        assert!(PartitionScheduler::new(Schedule::new(vec![]), InitialFraction::FirstEntry, false)
            .is_err());
        assert!(PartitionScheduler::new(
            Schedule::constant(0.5),
            InitialFraction::Explicit(0.0),
            false
        )
        .is_err());
    }

    #[test]
    fn test_out_of_range_fraction_rejected_when_in_effect() {
        let mut s = PartitionScheduler::new(
            schedule(&[(0, 0.5), (3, 1.5)]),
            InitialFraction::FirstEntry,
            false,
        )
        .unwrap();
        s.update(1, &abcd()).unwrap();
        let err = s.update(4, &abcd()).unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidConfiguration(_)));
        // State untouched.
        assert_eq!(s.state().fraction().unwrap().get(), 0.5);
        assert_eq!(s.state().last_step(), Some(1));
    }

    #[test]
    fn test_budget_too_small_leaves_state_untouched() {
        let mut s = PartitionScheduler::new(
            schedule(&[(0, 1.0), (2, 0.1)]),
            InitialFraction::FirstEntry,
            false,
        )
        .unwrap();
        let before = s.update(1, &abcd()).unwrap();
        match s.update(3, &abcd()).unwrap_err() {
            ScheduleError::BudgetTooSmall {
                suggested_fraction, ..
            } => assert!((suggested_fraction - 0.4).abs() < 1e-12),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(Arc::ptr_eq(
            s.state().assignment().unwrap(),
            &before.assignment
        ));
        assert_eq!(s.state().repartitions(), 1);
    }

    #[test]
    fn test_adjust_budget() {
        let mut s =
            PartitionScheduler::new(Schedule::constant(0.1), InitialFraction::FirstEntry, true)
                .unwrap();
        let u = s.update(1, &abcd()).unwrap();
        assert_eq!(u.budget.as_bytes(), 10);
        assert_eq!(u.assignment.effective_budget.as_bytes(), 40);
    }

    #[test]
    fn test_step_regression_rejected() {
        let mut s =
            PartitionScheduler::new(Schedule::constant(0.5), InitialFraction::FirstEntry, false)
                .unwrap();
        s.update(5, &abcd()).unwrap();
        s.update(5, &abcd()).unwrap();
        assert!(s.update(4, &abcd()).is_err());
        assert!(s.update(0, &abcd()).is_err());
    }

    #[test]
    fn test_tensor_set_change_repacks() {
        let mut s =
            PartitionScheduler::new(Schedule::constant(0.5), InitialFraction::FirstEntry, false)
                .unwrap();
        s.update(1, &abcd()).unwrap();
        let more = tensors(&[("A", 40), ("B", 30), ("C", 20), ("D", 10), ("E", 10)]);
        let u = s.update(2, &more).unwrap();
        assert!(u.repartitioned);
        assert_eq!(u.assignment.num_tensors(), 5);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let mut fwd =
            PartitionScheduler::new(Schedule::constant(0.5), InitialFraction::FirstEntry, false)
                .unwrap();
        let mut rev =
            PartitionScheduler::new(Schedule::constant(0.5), InitialFraction::FirstEntry, false)
                .unwrap();
        let mut reversed = abcd();
        reversed.reverse();
        let a = fwd.update(1, &abcd()).unwrap();
        let b = rev.update(1, &reversed).unwrap();
        assert_eq!(*a.assignment, *b.assignment);
    }

    #[test]
    fn test_parsed_schedule_end_to_end() {
        // 32 × 4 peers per step over 3200 examples: 25 steps per epoch.
        let sched = ScheduleParser::new(32, 3200, 4)
            .unwrap()
            .parse("0:0.5,1:1.0")
            .unwrap();
        let mut s = PartitionScheduler::new(sched, InitialFraction::FirstEntry, false).unwrap();

        let mut synced_per_step = Vec::new();
        for step in 1..=27 {
            let u = s.update(step, &abcd()).unwrap();
            let members = SyncSelector::active_members(step, &u.assignment).unwrap();
            synced_per_step.push(members.len());
        }
        // Two partitions of two tensors for 25 steps, then everything at once.
        assert!(synced_per_step[..25].iter().all(|&n| n == 2));
        assert_eq!(&synced_per_step[25..], &[4, 4]);
    }
}
