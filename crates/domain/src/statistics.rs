use std::collections::BTreeMap;

use crate::{
    ExerciseID, HistoryPoint, Name, Student, StudentID, WorkoutPlan, aggregate_exercise_history,
};

/// Load statistics of an exercise history.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Summary {
    pub min: f32,
    pub max: f32,
    pub avg: f32,
    /// Change in percent from the first to the last point.
    pub evolution: i32,
}

/// Summarize the weights of a history.
///
/// Minimum, maximum and average only consider positive weights. The evolution compares the
/// first and the last point, ordered by week and then by date, and is zero if the first weight
/// is not positive.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn summary(history: &[HistoryPoint]) -> Summary {
    let weights = history
        .iter()
        .map(|p| f64::from(p.weight))
        .filter(|w| *w > 0.0)
        .collect::<Vec<_>>();

    if weights.is_empty() {
        return Summary {
            evolution: evolution(history),
            ..Summary::default()
        };
    }

    #[allow(clippy::cast_precision_loss)]
    let avg = weights.iter().sum::<f64>() / weights.len() as f64;

    Summary {
        min: weights.iter().copied().fold(f64::INFINITY, f64::min) as f32,
        max: weights.iter().copied().fold(f64::NEG_INFINITY, f64::max) as f32,
        avg: round_half_up(avg) as f32,
        evolution: evolution(history),
    }
}

/// Change from the first to the last point in percent, rounded in double precision.
#[allow(clippy::cast_possible_truncation)]
fn evolution(history: &[HistoryPoint]) -> i32 {
    let mut sorted = history.iter().collect::<Vec<_>>();
    sorted.sort_by_key(|p| (p.week, p.date));

    let (Some(first), Some(last)) = (sorted.first(), sorted.last()) else {
        return 0;
    };

    let first = f64::from(first.weight);
    let last = f64::from(last.weight);

    if first > 0.0 {
        round_half_up((last - first) / first * 100.0) as i32
    } else {
        0
    }
}

fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Load statistics of one exercise of a student.
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseStats {
    pub exercise_id: ExerciseID,
    pub name: Name,
    pub summary: Summary,
}

/// Statistics for every exercise a student has recorded performances for, ordered by name.
#[must_use]
pub fn exercise_stats(plans: &[WorkoutPlan], student_id: StudentID) -> Vec<ExerciseStats> {
    let student_plans = plans
        .iter()
        .filter(|p| p.student_id == student_id)
        .cloned()
        .collect::<Vec<_>>();

    let mut exercises: BTreeMap<ExerciseID, Name> = BTreeMap::new();
    for assignment in student_plans.iter().flat_map(|p| &p.assignments) {
        if let Some(exercise) = &assignment.exercise {
            if !assignment.performances.is_empty() {
                exercises.insert(assignment.exercise_id, exercise.name.clone());
            }
        }
    }

    let mut stats = exercises
        .into_iter()
        .filter_map(|(exercise_id, name)| {
            let history = aggregate_exercise_history(&student_plans, exercise_id).history;
            if history.is_empty() {
                None
            } else {
                Some(ExerciseStats {
                    exercise_id,
                    name,
                    summary: summary(&history),
                })
            }
        })
        .collect::<Vec<_>>();
    stats.sort_by_cached_key(|s| (sort_key(&s.name.to_string()), s.name.clone()));
    stats
}

/// Lowercase name with the accents of Latin letters removed.
fn sort_key(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            'ñ' => 'n',
            c => c,
        })
        .collect()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DashboardStats {
    pub students: usize,
    pub active_plans: usize,
}

#[must_use]
pub fn dashboard_stats(students: &[Student], plans: &[WorkoutPlan]) -> DashboardStats {
    DashboardStats {
        students: students.len(),
        active_plans: plans.iter().filter(|p| p.active).count(),
    }
}
