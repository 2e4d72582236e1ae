#![warn(clippy::pedantic)]

use spotter_domain::{
    ExerciseHistory, ExerciseID, WorkoutPlan, WorkoutPlanID, aggregate_exercise_history,
    exercise_history,
};

pub mod log;

#[allow(async_fn_in_trait)]
pub trait SettingsRepository {
    async fn read_settings(&self) -> Result<Settings, String>;
    async fn write_settings(&self, settings: Settings) -> Result<(), String>;
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub theme: Theme,
    pub history_view: HistoryView,
    pub show_reps: bool,
    pub show_boundaries: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            history_view: HistoryView::Aggregate,
            show_reps: true,
            show_boundaries: true,
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum Theme {
    System,
    Light,
    Dark,
}

/// Which plans an exercise chart is built from.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum HistoryView {
    /// All plans of the student on one continuous week axis.
    Aggregate,
    /// Only the selected plan, with plan-local weeks.
    SinglePlan,
}

impl HistoryView {
    #[must_use]
    pub fn history(
        self,
        plans: &[WorkoutPlan],
        selected_plan: Option<WorkoutPlanID>,
        exercise_id: ExerciseID,
    ) -> ExerciseHistory {
        match self {
            HistoryView::Aggregate => aggregate_exercise_history(plans, exercise_id),
            HistoryView::SinglePlan => ExerciseHistory {
                history: plans
                    .iter()
                    .find(|p| Some(p.id) == selected_plan)
                    .map(|p| exercise_history(p, exercise_id))
                    .unwrap_or_default(),
                boundaries: vec![],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use spotter_domain::{Assignment, Performance};

    use super::*;

    fn plan(id: u128, month: u32, weight: f32) -> WorkoutPlan {
        let date = NaiveDate::from_ymd_opt(2024, month, 5).unwrap();
        WorkoutPlan {
            id: id.into(),
            student_id: 1.into(),
            student_name: Some("Alice".to_string()),
            name: Some(format!("Plan {id}")),
            start_date: date,
            end_date: date,
            active: false,
            created_at: Utc.with_ymd_and_hms(2024, month, 1, 0, 0, 0).unwrap(),
            assignments: vec![Assignment {
                id: id.into(),
                exercise_id: 1.into(),
                week: 1,
                order_index: 0,
                exercise: None,
                performances: vec![Performance {
                    id: id.into(),
                    date,
                    weight,
                    reps: 10,
                }],
            }],
        }
    }

    #[test]
    fn test_history_view_aggregate() {
        let plans = vec![plan(1, 1, 40.0), plan(2, 2, 45.0)];
        let history = HistoryView::Aggregate.history(&plans, Some(2.into()), 1.into());
        assert_eq!(
            history.history.iter().map(|p| p.week).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(history.boundaries.len(), 2);
    }

    #[test]
    fn test_history_view_single_plan() {
        let plans = vec![plan(1, 1, 40.0), plan(2, 2, 45.0)];
        let history = HistoryView::SinglePlan.history(&plans, Some(2.into()), 1.into());
        assert_eq!(
            history
                .history
                .iter()
                .map(|p| (p.week, p.weight))
                .collect::<Vec<_>>(),
            vec![(1, 45.0)]
        );
        assert!(history.boundaries.is_empty());
        assert_eq!(
            HistoryView::SinglePlan.history(&plans, None, 1.into()),
            ExerciseHistory::default()
        );
    }

    #[test]
    fn test_settings_deserialize_partial() {
        let settings: Settings = serde_json::from_str(r#"{"theme":"Dark"}"#).unwrap();
        assert_eq!(
            settings,
            Settings {
                theme: Theme::Dark,
                ..Settings::default()
            }
        );
    }
}
