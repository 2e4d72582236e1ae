use log::{debug, error};

use crate::{
    AssignmentID, CreateError, DeleteError, Exercise, ExerciseID, ExerciseRepository,
    ExerciseService, NewWorkoutPlan, Performance, ReadError, Student, StudentID,
    StudentRepository, StudentService, UpdateError, WorkoutPlan, WorkoutPlanID,
    WorkoutPlanRepository, WorkoutPlanService,
};

pub struct Service<R> {
    repository: R,
}

impl<R> Service<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }
}

macro_rules! log_on_error {
    ($func: expr, $error: ident, $action: literal, $entity: literal) => {{
        let result = $func.await;
        match result {
            Ok(_) => {}
            Err(ref err) => match err {
                $error::Storage(crate::StorageError::NoConnection) => {
                    debug!("failed to {} {}: {err}", $action, $entity);
                }
                _ => {
                    error!("failed to {} {}: {err}", $action, $entity);
                }
            },
        }
        result
    }};
}

impl<R: StudentRepository> StudentService for Service<R> {
    async fn get_students(&self) -> Result<Vec<Student>, ReadError> {
        log_on_error!(self.repository.read_students(), ReadError, "get", "students")
    }

    async fn create_student(&self, student: Student) -> Result<Student, CreateError> {
        log_on_error!(
            self.repository.create_student(student),
            CreateError,
            "create",
            "student"
        )
    }

    async fn replace_student(&self, student: Student) -> Result<Student, UpdateError> {
        log_on_error!(
            self.repository.replace_student(student),
            UpdateError,
            "replace",
            "student"
        )
    }

    async fn delete_student(&self, id: StudentID) -> Result<StudentID, DeleteError> {
        log_on_error!(
            self.repository.delete_student(id),
            DeleteError,
            "delete",
            "student"
        )
    }
}

impl<R: ExerciseRepository> ExerciseService for Service<R> {
    async fn get_exercises(&self) -> Result<Vec<Exercise>, ReadError> {
        log_on_error!(
            self.repository.read_exercises(),
            ReadError,
            "get",
            "exercises"
        )
    }

    async fn create_exercise(&self, exercise: Exercise) -> Result<Exercise, CreateError> {
        log_on_error!(
            self.repository.create_exercise(exercise),
            CreateError,
            "create",
            "exercise"
        )
    }

    async fn replace_exercise(&self, exercise: Exercise) -> Result<Exercise, UpdateError> {
        log_on_error!(
            self.repository.replace_exercise(exercise),
            UpdateError,
            "replace",
            "exercise"
        )
    }

    async fn delete_exercise(&self, id: ExerciseID) -> Result<ExerciseID, DeleteError> {
        log_on_error!(
            self.repository.delete_exercise(id),
            DeleteError,
            "delete",
            "exercise"
        )
    }
}

impl<R: WorkoutPlanRepository> WorkoutPlanService for Service<R> {
    async fn get_workout_plans(&self) -> Result<Vec<WorkoutPlan>, ReadError> {
        log_on_error!(
            self.repository.read_workout_plans(),
            ReadError,
            "get",
            "workout plans"
        )
    }

    async fn get_workout_plan(&self, id: WorkoutPlanID) -> Result<WorkoutPlan, ReadError> {
        log_on_error!(
            self.repository.read_workout_plan(id),
            ReadError,
            "get",
            "workout plan"
        )
    }

    async fn create_workout_plan(&self, plan: NewWorkoutPlan) -> Result<WorkoutPlan, CreateError> {
        log_on_error!(
            self.repository.create_workout_plan(plan),
            CreateError,
            "create",
            "workout plan"
        )
    }

    async fn modify_workout_plan(
        &self,
        id: WorkoutPlanID,
        name: Option<String>,
        active: Option<bool>,
    ) -> Result<WorkoutPlan, UpdateError> {
        log_on_error!(
            self.repository.modify_workout_plan(id, name, active),
            UpdateError,
            "modify",
            "workout plan"
        )
    }

    async fn delete_workout_plan(&self, id: WorkoutPlanID) -> Result<WorkoutPlanID, DeleteError> {
        log_on_error!(
            self.repository.delete_workout_plan(id),
            DeleteError,
            "delete",
            "workout plan"
        )
    }

    async fn save_performance(
        &self,
        assignment_id: AssignmentID,
        performance: Performance,
    ) -> Result<Performance, CreateError> {
        log_on_error!(
            self.repository
                .upsert_performance(assignment_id, performance),
            CreateError,
            "save",
            "performance"
        )
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use chrono::{NaiveDate, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    use crate::{
        Assignment, MuscleGroup, Name, NewAssignment, PerformanceID, StorageError, WeekNumber,
    };

    use super::*;

    #[derive(Default)]
    struct FakeRepository {
        connected: bool,
        students: RefCell<Vec<Student>>,
        plans: RefCell<Vec<WorkoutPlan>>,
    }

    impl FakeRepository {
        fn connected() -> Self {
            Self {
                connected: true,
                ..Self::default()
            }
        }

        fn check(&self) -> Result<(), StorageError> {
            if self.connected {
                Ok(())
            } else {
                Err(StorageError::NoConnection)
            }
        }
    }

    impl StudentRepository for FakeRepository {
        async fn read_students(&self) -> Result<Vec<Student>, ReadError> {
            self.check()?;
            Ok(self.students.borrow().clone())
        }

        async fn create_student(&self, student: Student) -> Result<Student, CreateError> {
            self.check()?;
            let mut students = self.students.borrow_mut();
            if students.iter().any(|s| s.name == student.name) {
                return Err(CreateError::Conflict);
            }
            let student = Student {
                id: StudentID::from(students.len() as u128 + 1),
                ..student
            };
            students.push(student.clone());
            Ok(student)
        }

        async fn replace_student(&self, student: Student) -> Result<Student, UpdateError> {
            self.check()?;
            let mut students = self.students.borrow_mut();
            match students.iter_mut().find(|s| s.id == student.id) {
                Some(s) => {
                    *s = student.clone();
                    Ok(student)
                }
                None => Err(UpdateError::Other("unknown student".into())),
            }
        }

        async fn delete_student(&self, id: StudentID) -> Result<StudentID, DeleteError> {
            self.check()?;
            self.students.borrow_mut().retain(|s| s.id != id);
            Ok(id)
        }
    }

    impl WorkoutPlanRepository for FakeRepository {
        async fn read_workout_plans(&self) -> Result<Vec<WorkoutPlan>, ReadError> {
            self.check()?;
            Ok(self.plans.borrow().clone())
        }

        async fn read_workout_plan(&self, id: WorkoutPlanID) -> Result<WorkoutPlan, ReadError> {
            self.check()?;
            self.plans
                .borrow()
                .iter()
                .find(|p| p.id == id)
                .cloned()
                .ok_or(ReadError::NotFound)
        }

        async fn create_workout_plan(
            &self,
            plan: NewWorkoutPlan,
        ) -> Result<WorkoutPlan, CreateError> {
            self.check()?;
            let mut plans = self.plans.borrow_mut();
            let id = plans.len() as u128 + 1;
            let plan = WorkoutPlan {
                id: id.into(),
                student_id: plan.student_id,
                student_name: None,
                name: plan.name,
                start_date: plan.start_date,
                end_date: plan.end_date,
                active: plan.active,
                created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                    + chrono::Duration::days(i64::try_from(id).unwrap()),
                assignments: plan
                    .assignments
                    .iter()
                    .zip(1..)
                    .map(|(a, i)| Assignment {
                        id: (id * 100 + i).into(),
                        exercise_id: a.exercise_id,
                        week: a.week.into(),
                        order_index: a.order_index,
                        exercise: None,
                        performances: vec![],
                    })
                    .collect(),
            };
            plans.push(plan.clone());
            Ok(plan)
        }

        async fn modify_workout_plan(
            &self,
            id: WorkoutPlanID,
            name: Option<String>,
            active: Option<bool>,
        ) -> Result<WorkoutPlan, UpdateError> {
            self.check()?;
            let mut plans = self.plans.borrow_mut();
            let Some(plan) = plans.iter_mut().find(|p| p.id == id) else {
                return Err(ReadError::NotFound.into());
            };
            if let Some(name) = name {
                plan.name = Some(name);
            }
            if let Some(active) = active {
                plan.active = active;
            }
            Ok(plan.clone())
        }

        async fn delete_workout_plan(
            &self,
            id: WorkoutPlanID,
        ) -> Result<WorkoutPlanID, DeleteError> {
            self.check()?;
            self.plans.borrow_mut().retain(|p| p.id != id);
            Ok(id)
        }

        async fn upsert_performance(
            &self,
            assignment_id: AssignmentID,
            performance: Performance,
        ) -> Result<Performance, CreateError> {
            self.check()?;
            let mut plans = self.plans.borrow_mut();
            let Some(assignment) = plans
                .iter_mut()
                .flat_map(|p| p.assignments.iter_mut())
                .find(|a| a.id == assignment_id)
            else {
                return Err(CreateError::Other("unknown assignment".into()));
            };
            assignment.performances.retain(|p| p.date != performance.date);
            assignment.performances.push(performance.clone());
            Ok(performance)
        }
    }

    fn new_plan(student_id: StudentID, weeks: &[u32]) -> NewWorkoutPlan {
        NewWorkoutPlan {
            student_id,
            name: None,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 28).unwrap(),
            active: true,
            assignments: weeks
                .iter()
                .map(|week| NewAssignment {
                    exercise_id: 7.into(),
                    week: WeekNumber::new(*week).unwrap(),
                    order_index: 0,
                })
                .collect(),
        }
    }

    fn performance(day: u32, weight: f32, reps: u32) -> Performance {
        Performance {
            id: PerformanceID::nil(),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            weight,
            reps,
        }
    }

    #[tokio::test]
    async fn test_students() {
        let service = Service::new(FakeRepository::connected());
        let alice = service
            .create_student(Student::new(Name::new("Alice").unwrap(), "", ""))
            .await
            .unwrap();
        assert_eq!(alice.id, 1.into());
        assert!(matches!(
            service
                .create_student(Student::new(Name::new("Alice").unwrap(), "", ""))
                .await,
            Err(CreateError::Conflict)
        ));

        let renamed = Student {
            name: Name::new("Alicia").unwrap(),
            ..alice
        };
        assert_eq!(
            service.replace_student(renamed.clone()).await.unwrap(),
            renamed
        );
        assert_eq!(service.get_students().await.unwrap(), vec![renamed]);
        assert_eq!(service.delete_student(1.into()).await.unwrap(), 1.into());
        assert_eq!(service.get_students().await.unwrap(), vec![]);
    }

    #[tokio::test]
    async fn test_no_connection() {
        let service = Service::new(FakeRepository::default());
        assert!(matches!(
            service.get_students().await,
            Err(ReadError::Storage(StorageError::NoConnection))
        ));
        assert!(matches!(
            service.get_workout_plans().await,
            Err(ReadError::Storage(StorageError::NoConnection))
        ));
        assert!(matches!(
            service.delete_workout_plan(1.into()).await,
            Err(DeleteError::Storage(StorageError::NoConnection))
        ));
    }

    #[tokio::test]
    async fn test_workout_plans() {
        let service = Service::new(FakeRepository::connected());
        let plan = service
            .create_workout_plan(new_plan(1.into(), &[1, 2]))
            .await
            .unwrap();
        assert_eq!(plan.span(), 2);
        assert_eq!(service.get_workout_plan(plan.id).await.unwrap(), plan);
        assert!(matches!(
            service.get_workout_plan(9.into()).await,
            Err(ReadError::NotFound)
        ));

        let modified = service
            .modify_workout_plan(plan.id, Some("Hipertrofia".to_string()), Some(false))
            .await
            .unwrap();
        assert_eq!(modified.name, Some("Hipertrofia".to_string()));
        assert!(!modified.active);

        assert_eq!(
            service.delete_workout_plan(plan.id).await.unwrap(),
            plan.id
        );
        assert_eq!(service.get_workout_plans().await.unwrap(), vec![]);
    }

    #[tokio::test]
    async fn test_exercise_history() {
        let service = Service::new(FakeRepository::connected());
        let first = service
            .create_workout_plan(new_plan(1.into(), &[1, 2]))
            .await
            .unwrap();
        let second = service
            .create_workout_plan(new_plan(1.into(), &[1]))
            .await
            .unwrap();
        let other = service
            .create_workout_plan(new_plan(2.into(), &[1]))
            .await
            .unwrap();

        service
            .save_performance(first.assignments[0].id, performance(2, 40.0, 10))
            .await
            .unwrap();
        service
            .save_performance(first.assignments[0].id, performance(2, 42.5, 10))
            .await
            .unwrap();
        service
            .save_performance(first.assignments[1].id, performance(9, 45.0, 8))
            .await
            .unwrap();
        service
            .save_performance(second.assignments[0].id, performance(16, 50.0, 8))
            .await
            .unwrap();
        service
            .save_performance(other.assignments[0].id, performance(16, 99.0, 1))
            .await
            .unwrap();

        let history = service
            .get_exercise_history(1.into(), 7.into())
            .await
            .unwrap();
        assert_eq!(
            history
                .history
                .iter()
                .map(|p| (p.week, p.weight))
                .collect::<Vec<_>>(),
            vec![(1, 42.5), (2, 45.0), (3, 50.0)]
        );
        assert_eq!(
            history
                .boundaries
                .iter()
                .map(|b| (b.start_week, b.end_week))
                .collect::<Vec<_>>(),
            vec![(1, 2), (3, 3)]
        );
    }

    #[tokio::test]
    async fn test_exercise_stats_require_joined_exercise() {
        let service = Service::new(FakeRepository::connected());
        let plan = service
            .create_workout_plan(new_plan(1.into(), &[1]))
            .await
            .unwrap();
        service
            .save_performance(plan.assignments[0].id, performance(2, 40.0, 10))
            .await
            .unwrap();
        assert_eq!(service.get_exercise_stats(1.into()).await.unwrap(), vec![]);

        service.repository.plans.borrow_mut()[0].assignments[0].exercise = Some(Exercise {
            id: 7.into(),
            name: Name::new("Leg press").unwrap(),
            muscle_group: MuscleGroup::new("Pernas").unwrap(),
            description: None,
            image_url: None,
        });
        let stats = service.get_exercise_stats(1.into()).await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].name, Name::new("Leg press").unwrap());
        assert_eq!(stats[0].summary.max, 40.0);
    }

    #[tokio::test]
    async fn test_save_performance_unknown_assignment() {
        let service = Service::new(FakeRepository::connected());
        assert!(matches!(
            service
                .save_performance(1.into(), performance(2, 40.0, 10))
                .await,
            Err(CreateError::Other(_))
        ));
    }
}
