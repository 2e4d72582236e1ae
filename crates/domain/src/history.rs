use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::warn;

use crate::{ExerciseID, WorkoutPlan};

/// Boundary label used for plans without a name.
pub const DEFAULT_PLAN_NAME: &str = "Treino";

/// A single recorded set of an exercise, placed on a week axis.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPoint {
    pub date: NaiveDate,
    pub weight: f32,
    pub reps: u32,
    pub week: u32,
}

/// The range of global weeks covered by one workout plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodBoundary {
    pub name: String,
    pub start_week: u32,
    pub end_week: u32,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExerciseHistory {
    pub history: Vec<HistoryPoint>,
    pub boundaries: Vec<PeriodBoundary>,
}

/// Collect all performances of an exercise within a single plan.
///
/// Points keep the plan-local week number and appear in the order in which they are stored.
#[must_use]
pub fn exercise_history(plan: &WorkoutPlan, exercise_id: ExerciseID) -> Vec<HistoryPoint> {
    plan.assignments
        .iter()
        .filter(|a| a.exercise_id == exercise_id)
        .flat_map(|a| {
            a.performances.iter().map(|p| HistoryPoint {
                date: p.date,
                weight: p.weight,
                reps: p.reps,
                week: a.week,
            })
        })
        .collect()
}

/// Build a continuous history of an exercise across consecutive plans.
///
/// Plans are ordered by creation time. The weeks of each plan continue the week count of the
/// preceding plans, so the week of a point is the local week plus the total span of all earlier
/// plans. Plans without a span, or whose weeks would exceed the range of `u32`, are ignored. A
/// boundary is emitted for every other plan, even if it holds no data for the exercise.
///
/// Only the best point of each global week is kept: the highest weight, or the most reps if the
/// weight is equal. On a complete tie the first point wins.
#[must_use]
pub fn aggregate_exercise_history(
    plans: &[WorkoutPlan],
    exercise_id: ExerciseID,
) -> ExerciseHistory {
    let mut sorted_plans = plans.iter().collect::<Vec<_>>();
    sorted_plans.sort_by_key(|p| p.created_at);

    let mut boundaries = vec![];
    let mut best: BTreeMap<u32, HistoryPoint> = BTreeMap::new();
    let mut week_offset: u32 = 0;

    for plan in sorted_plans {
        let span = plan.span();

        if span == 0 {
            let dropped = exercise_history(plan, exercise_id).len();
            if dropped > 0 {
                warn!(
                    "ignored {dropped} performances of workout plan {} without week numbers",
                    *plan.id
                );
            }
            continue;
        }

        let Some(end_week) = week_offset.checked_add(span) else {
            warn!(
                "ignored workout plan {} as its weeks exceed the week range",
                *plan.id
            );
            continue;
        };

        boundaries.push(PeriodBoundary {
            name: plan
                .name
                .clone()
                .unwrap_or_else(|| DEFAULT_PLAN_NAME.to_string()),
            start_week: week_offset + 1,
            end_week,
        });

        for mut point in exercise_history(plan, exercise_id) {
            point.week += week_offset;
            match best.get(&point.week) {
                Some(existing) if !is_better(&point, existing) => {}
                _ => {
                    best.insert(point.week, point);
                }
            }
        }

        week_offset = end_week;
    }

    ExerciseHistory {
        history: best.into_values().collect(),
        boundaries,
    }
}

fn is_better(point: &HistoryPoint, existing: &HistoryPoint) -> bool {
    #[allow(clippy::float_cmp)]
    let equal_weight = point.weight == existing.weight;
    point.weight > existing.weight || (equal_weight && point.reps > existing.reps)
}

/// The most recent point recorded strictly before `date`.
#[must_use]
pub fn last_record_before(history: &[HistoryPoint], date: NaiveDate) -> Option<&HistoryPoint> {
    history
        .iter()
        .filter(|p| p.date < date)
        .max_by_key(|p| p.date)
}
