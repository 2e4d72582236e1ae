use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc, Weekday};
use derive_more::{Deref, Display, Into};
use uuid::Uuid;

use crate::{
    CreateError, DeleteError, Exercise, ExerciseHistory, ExerciseID, ExerciseStats, ReadError,
    StudentID, UpdateError, ValidationError, aggregate_exercise_history, exercise_stats,
};

/// Upper bound for the length of a workout plan.
pub const MAX_WEEKS: u32 = 12;

#[allow(async_fn_in_trait)]
pub trait WorkoutPlanService {
    async fn get_workout_plans(&self) -> Result<Vec<WorkoutPlan>, ReadError>;
    async fn get_workout_plan(&self, id: WorkoutPlanID) -> Result<WorkoutPlan, ReadError>;
    async fn create_workout_plan(&self, plan: NewWorkoutPlan) -> Result<WorkoutPlan, CreateError>;
    async fn modify_workout_plan(
        &self,
        id: WorkoutPlanID,
        name: Option<String>,
        active: Option<bool>,
    ) -> Result<WorkoutPlan, UpdateError>;
    async fn delete_workout_plan(&self, id: WorkoutPlanID) -> Result<WorkoutPlanID, DeleteError>;
    async fn save_performance(
        &self,
        assignment_id: AssignmentID,
        performance: Performance,
    ) -> Result<Performance, CreateError>;

    async fn get_student_workout_plans(
        &self,
        student_id: StudentID,
    ) -> Result<Vec<WorkoutPlan>, ReadError> {
        Ok(self
            .get_workout_plans()
            .await?
            .into_iter()
            .filter(|p| p.student_id == student_id)
            .collect())
    }

    async fn get_exercise_history(
        &self,
        student_id: StudentID,
        exercise_id: ExerciseID,
    ) -> Result<ExerciseHistory, ReadError> {
        let plans = self.get_student_workout_plans(student_id).await?;
        Ok(aggregate_exercise_history(&plans, exercise_id))
    }

    async fn get_exercise_stats(
        &self,
        student_id: StudentID,
    ) -> Result<Vec<ExerciseStats>, ReadError> {
        let plans = self.get_workout_plans().await?;
        Ok(exercise_stats(&plans, student_id))
    }

    fn validate_plan_dates(
        &self,
        start_date: &str,
        end_date: &str,
    ) -> Result<(NaiveDate, NaiveDate), ValidationError> {
        let Ok(start) = start_date.trim().parse::<NaiveDate>() else {
            return Err(ValidationError::Other("Invalid start date".into()));
        };
        let Ok(end) = end_date.trim().parse::<NaiveDate>() else {
            return Err(ValidationError::Other("Invalid end date".into()));
        };
        if start > end {
            return Err(ValidationError::Other(
                "End date must not be before start date".into(),
            ));
        }
        Ok((start, end))
    }

    fn validate_week_number(&self, week: &str) -> Result<WeekNumber, ValidationError> {
        match week.trim().parse::<u32>() {
            Ok(parsed_week) => {
                WeekNumber::new(parsed_week).map_err(|err| ValidationError::Other(err.into()))
            }
            Err(_) => Err(ValidationError::Other(
                "Week must be a positive integer".into(),
            )),
        }
    }

    fn validate_assignments(
        &self,
        assignments: &[NewAssignment],
        week_count: u32,
    ) -> Result<(), ValidationError> {
        if assignments.is_empty() {
            return Err(ValidationError::Other(
                "Workout plan must contain at least one exercise".into(),
            ));
        }
        if let Some(assignment) = assignments.iter().find(|a| *a.week > week_count) {
            return Err(ValidationError::Other(
                format!(
                    "Week {} exceeds plan length of {week_count} weeks",
                    assignment.week
                )
                .into(),
            ));
        }
        Ok(())
    }

    fn validate_weight(&self, weight: &str) -> Result<f32, ValidationError> {
        match weight.replace(',', ".").trim().parse::<f32>() {
            Ok(parsed_weight) => {
                if (0.0..1000.0).contains(&parsed_weight) {
                    Ok(parsed_weight)
                } else {
                    Err(ValidationError::Other(
                        "Weight must be in the range 0.0 to 999.9 kg".into(),
                    ))
                }
            }
            Err(_) => Err(ValidationError::Other(
                "Weight must be a decimal number".into(),
            )),
        }
    }

    fn validate_reps(&self, reps: &str) -> Result<u32, ValidationError> {
        match reps.trim().parse::<u32>() {
            Ok(parsed_reps) => {
                if parsed_reps < 1000 {
                    Ok(parsed_reps)
                } else {
                    Err(ValidationError::Other(
                        "Reps must be in the range 0 to 999".into(),
                    ))
                }
            }
            Err(_) => Err(ValidationError::Other("Reps must be an integer".into())),
        }
    }
}

#[allow(async_fn_in_trait)]
pub trait WorkoutPlanRepository {
    async fn read_workout_plans(&self) -> Result<Vec<WorkoutPlan>, ReadError>;
    async fn read_workout_plan(&self, id: WorkoutPlanID) -> Result<WorkoutPlan, ReadError>;
    async fn create_workout_plan(&self, plan: NewWorkoutPlan) -> Result<WorkoutPlan, CreateError>;
    async fn modify_workout_plan(
        &self,
        id: WorkoutPlanID,
        name: Option<String>,
        active: Option<bool>,
    ) -> Result<WorkoutPlan, UpdateError>;
    async fn delete_workout_plan(&self, id: WorkoutPlanID) -> Result<WorkoutPlanID, DeleteError>;
    async fn upsert_performance(
        &self,
        assignment_id: AssignmentID,
        performance: Performance,
    ) -> Result<Performance, CreateError>;
}

/// A student's multi-week training plan.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutPlan {
    pub id: WorkoutPlanID,
    pub student_id: StudentID,
    pub student_name: Option<String>,
    pub name: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub assignments: Vec<Assignment>,
}

impl WorkoutPlan {
    /// Number of weeks covered by the plan, i.e. the highest week number of all assignments.
    #[must_use]
    pub fn span(&self) -> u32 {
        self.assignments.iter().map(|a| a.week).max().unwrap_or(0)
    }

    /// Assignments grouped by week, each week ordered by position.
    #[must_use]
    pub fn weeks(&self) -> BTreeMap<u32, Vec<&Assignment>> {
        let mut weeks: BTreeMap<u32, Vec<&Assignment>> = BTreeMap::new();
        for assignment in &self.assignments {
            weeks.entry(assignment.week).or_default().push(assignment);
        }
        for assignments in weeks.values_mut() {
            assignments.sort_by_key(|a| a.order_index);
        }
        weeks
    }

    /// Distinct catalog exercises in order of first appearance.
    #[must_use]
    pub fn exercises(&self) -> Vec<&Exercise> {
        let mut seen = HashSet::new();
        self.assignments
            .iter()
            .filter_map(|a| a.exercise.as_ref())
            .filter(|e| seen.insert(e.id))
            .collect()
    }
}

#[derive(Deref, Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkoutPlanID(Uuid);

impl WorkoutPlanID {
    #[must_use]
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl From<Uuid> for WorkoutPlanID {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<u128> for WorkoutPlanID {
    fn from(value: u128) -> Self {
        Self(Uuid::from_bytes(value.to_be_bytes()))
    }
}

/// A catalog exercise scheduled in one week of a plan.
///
/// `week` is local to the plan and 1-based. A value of `0` marks a missing week number.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub id: AssignmentID,
    pub exercise_id: ExerciseID,
    pub week: u32,
    pub order_index: u32,
    pub exercise: Option<Exercise>,
    pub performances: Vec<Performance>,
}

#[derive(Deref, Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssignmentID(Uuid);

impl AssignmentID {
    #[must_use]
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }
}

impl From<Uuid> for AssignmentID {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<u128> for AssignmentID {
    fn from(value: u128) -> Self {
        Self(Uuid::from_bytes(value.to_be_bytes()))
    }
}

/// Load and repetitions recorded for an assignment on one day.
#[derive(Debug, Clone, PartialEq)]
pub struct Performance {
    pub id: PerformanceID,
    pub date: NaiveDate,
    pub weight: f32,
    pub reps: u32,
}

#[derive(Deref, Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PerformanceID(Uuid);

impl PerformanceID {
    #[must_use]
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }
}

impl From<Uuid> for PerformanceID {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<u128> for PerformanceID {
    fn from(value: u128) -> Self {
        Self(Uuid::from_bytes(value.to_be_bytes()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewWorkoutPlan {
    pub student_id: StudentID,
    pub name: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub active: bool,
    pub assignments: Vec<NewAssignment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewAssignment {
    pub exercise_id: ExerciseID,
    pub week: WeekNumber,
    pub order_index: u32,
}

impl NewAssignment {
    /// Flatten a week-to-exercises layout into assignments, numbering positions per week.
    #[must_use]
    pub fn from_weeks(weeks: &BTreeMap<WeekNumber, Vec<ExerciseID>>) -> Vec<NewAssignment> {
        weeks
            .iter()
            .flat_map(|(week, exercise_ids)| {
                exercise_ids
                    .iter()
                    .zip(0..)
                    .map(|(exercise_id, order_index)| NewAssignment {
                        exercise_id: *exercise_id,
                        week: *week,
                        order_index,
                    })
            })
            .collect()
    }
}

#[derive(Deref, Debug, Display, Clone, Copy, Into, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WeekNumber(u32);

impl WeekNumber {
    pub fn new(value: u32) -> Result<Self, WeekNumberError> {
        if !(1..=MAX_WEEKS).contains(&value) {
            return Err(WeekNumberError::OutOfRange);
        }

        Ok(Self(value))
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum WeekNumberError {
    #[error("Week must be in the range 1 to 12")]
    OutOfRange,
}

/// Number of weeks a plan between `start` and `end` needs.
///
/// Counts the distinct Sunday-based calendar weeks containing at least one weekday. The result
/// is clamped to `1..=MAX_WEEKS`. Returns `None` if `start` is after `end`.
#[must_use]
pub fn week_count(start: NaiveDate, end: NaiveDate) -> Option<u32> {
    if start > end {
        return None;
    }

    let weeks = start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .filter_map(|d| d.checked_sub_days(Days::new(u64::from(d.weekday().num_days_from_sunday()))))
        .collect::<BTreeSet<_>>();

    let count = u32::try_from(weeks.len()).unwrap_or(MAX_WEEKS);
    Some(count.clamp(1, MAX_WEEKS))
}

/// The `n` most recently created plans, newest first.
#[must_use]
pub fn recent_plans(plans: &[WorkoutPlan], n: usize) -> Vec<&WorkoutPlan> {
    let mut recent = plans.iter().collect::<Vec<_>>();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    recent.truncate(n);
    recent
}
