#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error>),
}

#[derive(thiserror::Error, Debug)]
pub enum CreateError {
    #[error("conflict")]
    Conflict,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error>),
}

impl From<UpdateError> for CreateError {
    fn from(value: UpdateError) -> Self {
        match value {
            UpdateError::Conflict => CreateError::Conflict,
            UpdateError::Storage(storage) => CreateError::Storage(storage),
            UpdateError::Other(other) => CreateError::Other(other),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum UpdateError {
    #[error("conflict")]
    Conflict,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error>),
}

impl From<ReadError> for UpdateError {
    fn from(value: ReadError) -> Self {
        match value {
            ReadError::NotFound => UpdateError::Other("not found".into()),
            ReadError::Storage(storage) => UpdateError::Storage(storage),
            ReadError::Other(other) => UpdateError::Other(other),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DeleteError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error>),
}

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("no connection")]
    NoConnection,
    #[error("no session")]
    NoSession,
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error>),
}

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("{0} already exists")]
    Conflict(String),
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_error_from_update_error() {
        assert!(matches!(
            CreateError::from(UpdateError::Conflict),
            CreateError::Conflict
        ));
        assert!(matches!(
            CreateError::from(UpdateError::Storage(StorageError::NoSession)),
            CreateError::Storage(StorageError::NoSession)
        ));
        assert!(matches!(
            CreateError::from(UpdateError::Other("foo".into())),
            CreateError::Other(error) if error.to_string() == "foo"
        ));
    }

    #[test]
    fn test_update_error_from_read_error() {
        assert!(matches!(
            UpdateError::from(ReadError::NotFound),
            UpdateError::Other(error) if error.to_string() == "not found"
        ));
        assert!(matches!(
            UpdateError::from(ReadError::Storage(StorageError::NoConnection)),
            UpdateError::Storage(StorageError::NoConnection)
        ));
    }

    #[test]
    fn test_validation_error_display() {
        assert_eq!(
            ValidationError::Conflict("name".to_string()).to_string(),
            "name already exists"
        );
        assert_eq!(
            ValidationError::Other("Invalid date".into()).to_string(),
            "Invalid date"
        );
    }
}
