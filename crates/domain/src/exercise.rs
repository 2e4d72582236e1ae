use derive_more::{AsRef, Deref, Display};
use uuid::Uuid;

use crate::{CreateError, DeleteError, Name, ReadError, UpdateError, ValidationError};

#[allow(async_fn_in_trait)]
pub trait ExerciseService {
    async fn get_exercises(&self) -> Result<Vec<Exercise>, ReadError>;
    async fn create_exercise(&self, exercise: Exercise) -> Result<Exercise, CreateError>;
    async fn replace_exercise(&self, exercise: Exercise) -> Result<Exercise, UpdateError>;
    async fn delete_exercise(&self, id: ExerciseID) -> Result<ExerciseID, DeleteError>;

    async fn validate_exercise_name(
        &self,
        name: &str,
        id: ExerciseID,
    ) -> Result<Name, ValidationError> {
        match Name::new(name) {
            Ok(name) => match self.get_exercises().await {
                Ok(exercises) => {
                    if exercises.iter().all(|e| e.id == id || e.name != name) {
                        Ok(name)
                    } else {
                        Err(ValidationError::Conflict("name".to_string()))
                    }
                }
                Err(err) => Err(ValidationError::Other(err.into())),
            },
            Err(err) => Err(ValidationError::Other(err.into())),
        }
    }

    fn validate_muscle_group(&self, muscle_group: &str) -> Result<MuscleGroup, ValidationError> {
        MuscleGroup::new(muscle_group).map_err(|err| ValidationError::Other(err.into()))
    }
}

#[allow(async_fn_in_trait)]
pub trait ExerciseRepository {
    async fn read_exercises(&self) -> Result<Vec<Exercise>, ReadError>;
    async fn create_exercise(&self, exercise: Exercise) -> Result<Exercise, CreateError>;
    async fn replace_exercise(&self, exercise: Exercise) -> Result<Exercise, UpdateError>;
    async fn delete_exercise(&self, id: ExerciseID) -> Result<ExerciseID, DeleteError>;
}

/// An entry of the trainer's exercise catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exercise {
    pub id: ExerciseID,
    pub name: Name,
    pub muscle_group: MuscleGroup,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Deref, Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExerciseID(Uuid);

impl ExerciseID {
    #[must_use]
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl From<Uuid> for ExerciseID {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<u128> for ExerciseID {
    fn from(value: u128) -> Self {
        Self(Uuid::from_bytes(value.to_be_bytes()))
    }
}

/// Free-form muscle group label, e.g. "Peito" or "Quadríceps".
#[derive(AsRef, Debug, Display, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MuscleGroup(String);

impl MuscleGroup {
    pub fn new(muscle_group: &str) -> Result<Self, MuscleGroupError> {
        let trimmed = muscle_group.trim();

        if trimmed.is_empty() {
            return Err(MuscleGroupError::Empty);
        }

        let len = trimmed.chars().count();

        if len > 64 {
            return Err(MuscleGroupError::TooLong(len));
        }

        Ok(MuscleGroup(trimmed.to_string()))
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum MuscleGroupError {
    #[error("Muscle group is required")]
    Empty,
    #[error("Muscle group must be 64 characters or fewer ({0} > 64)")]
    TooLong(usize),
}
