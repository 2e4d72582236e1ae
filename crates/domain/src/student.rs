use derive_more::Deref;
use uuid::Uuid;

use crate::{CreateError, DeleteError, Name, ReadError, UpdateError, ValidationError};

#[allow(async_fn_in_trait)]
pub trait StudentService {
    async fn get_students(&self) -> Result<Vec<Student>, ReadError>;
    async fn create_student(&self, student: Student) -> Result<Student, CreateError>;
    async fn replace_student(&self, student: Student) -> Result<Student, UpdateError>;
    async fn delete_student(&self, id: StudentID) -> Result<StudentID, DeleteError>;

    async fn validate_student_name(
        &self,
        name: &str,
        id: StudentID,
    ) -> Result<Name, ValidationError> {
        match Name::new(name) {
            Ok(name) => match self.get_students().await {
                Ok(students) => {
                    if students.iter().all(|s| s.id == id || s.name != name) {
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
}

#[allow(async_fn_in_trait)]
pub trait StudentRepository {
    async fn read_students(&self) -> Result<Vec<Student>, ReadError>;
    async fn create_student(&self, student: Student) -> Result<Student, CreateError>;
    async fn replace_student(&self, student: Student) -> Result<Student, UpdateError>;
    async fn delete_student(&self, id: StudentID) -> Result<StudentID, DeleteError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Student {
    pub id: StudentID,
    pub name: Name,
    pub contact: Option<String>,
    pub medical_info: Option<String>,
}

impl Student {
    /// Create a student that has not been stored yet.
    #[must_use]
    pub fn new(name: Name, contact: &str, medical_info: &str) -> Self {
        Self {
            id: StudentID::nil(),
            name,
            contact: non_empty(contact),
            medical_info: non_empty(medical_info),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[derive(Deref, Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StudentID(Uuid);

impl StudentID {
    #[must_use]
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl From<Uuid> for StudentID {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<u128> for StudentID {
    fn from(value: u128) -> Self {
        Self(Uuid::from_bytes(value.to_be_bytes()))
    }
}
