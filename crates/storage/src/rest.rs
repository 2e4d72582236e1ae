//! PostgREST backend
//!
//! All tables are accessed below `{url}/rest/v1`. The server restricts every query to the rows
//! of the signed-in personal trainer, so requests without a session are rejected locally.

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, error, warn};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};
use spotter_domain as domain;
use uuid::Uuid;

const WORKOUT_SELECT: &str = "*,students(name),workout_exercises(*,exercises(*),performances(*))";

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
}

impl BackendConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub trainer_id: Uuid,
    pub access_token: String,
}

#[derive(strum::Display, Debug, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<Value>,
}

impl Request {
    fn with_header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

#[allow(async_fn_in_trait)]
pub trait SendRequest {
    /// Fails only if no response was received.
    async fn send_request(&self, request: Request) -> Result<Response, String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GlooNetSendRequest;

impl SendRequest for GlooNetSendRequest {
    async fn send_request(&self, request: Request) -> Result<Response, String> {
        let mut builder = match request.method {
            Method::Get => gloo_net::http::Request::get(&request.url),
            Method::Post => gloo_net::http::Request::post(&request.url),
            Method::Patch => gloo_net::http::Request::patch(&request.url),
            Method::Delete => gloo_net::http::Request::delete(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        let request = match request.body {
            Some(body) => builder.json(&body),
            None => builder.build(),
        }
        .map_err(|err| err.to_string())?;
        let response = request.send().await.map_err(|err| err.to_string())?;
        let status = response.status();
        let body = response.text().await.map_err(|err| err.to_string())?;
        Ok(Response { status, body })
    }
}

pub struct REST<S: SendRequest> {
    config: BackendConfig,
    session: Option<Session>,
    sender: S,
}

impl REST<GlooNetSendRequest> {
    #[must_use]
    pub fn new(config: BackendConfig) -> Self {
        Self::with_sender(config, GlooNetSendRequest)
    }
}

impl<S: SendRequest> REST<S> {
    pub fn with_sender(config: BackendConfig, sender: S) -> Self {
        Self {
            config,
            session: None,
            sender,
        }
    }

    pub fn set_session(&mut self, session: Option<Session>) {
        self.session = session;
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    fn trainer_id(&self) -> Result<Uuid, FetchError> {
        self.session
            .as_ref()
            .map(|session| session.trainer_id)
            .ok_or(FetchError::NoSession)
    }

    fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Request, FetchError> {
        let session = self.session.as_ref().ok_or(FetchError::NoSession)?;
        Ok(Request {
            method,
            url: format!("{}/rest/v1/{path}", self.config.url.trim_end_matches('/')),
            headers: vec![
                ("apikey", self.config.anon_key.clone()),
                ("Authorization", format!("Bearer {}", session.access_token)),
            ],
            body,
        })
    }

    fn representation(
        &self,
        method: Method,
        path: &str,
        body: Value,
    ) -> Result<Request, FetchError> {
        Ok(self
            .request(method, path, Some(body))?
            .with_header("Prefer", "return=representation"))
    }

    async fn send(&self, request: Request) -> Result<String, FetchError> {
        debug!("{} {}", request.method, request.url);
        let response = self.sender.send_request(request).await.map_err(|err| {
            debug!("request failed: {err}");
            FetchError::NoConnection
        })?;
        match response.status {
            200..=299 => Ok(response.body),
            401 | 403 => Err(FetchError::NoSession),
            404 => Err(FetchError::NotFound),
            409 => Err(FetchError::Conflict),
            status => Err(FetchError::Status(status, response.body)),
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, request: Request) -> Result<T, FetchError> {
        let body = self.send(request).await?;
        serde_json::from_str(&body).map_err(|err| FetchError::InvalidResponse(err.to_string()))
    }

    /// Fetch a result set that must contain at least one row.
    async fn fetch_one<T: DeserializeOwned>(&self, request: Request) -> Result<T, FetchError> {
        self.fetch::<Vec<T>>(request)
            .await?
            .into_iter()
            .next()
            .ok_or(FetchError::NotFound)
    }
}

impl<S: SendRequest> domain::StudentRepository for REST<S> {
    async fn read_students(&self) -> Result<Vec<domain::Student>, domain::ReadError> {
        let students: Vec<Student> = self
            .fetch(self.request(Method::Get, "students?select=*&order=name.asc", None)?)
            .await?;
        Ok(valid_rows(students, "student"))
    }

    async fn create_student(
        &self,
        student: domain::Student,
    ) -> Result<domain::Student, domain::CreateError> {
        let student: Student = self
            .fetch_one(self.representation(
                Method::Post,
                "students",
                json!({
                    "personal_trainer_id": self.trainer_id()?,
                    "name": student.name.to_string(),
                    "contact": student.contact,
                    "medical_info": student.medical_info,
                }),
            )?)
            .await?;
        Ok(student.try_into()?)
    }

    async fn replace_student(
        &self,
        student: domain::Student,
    ) -> Result<domain::Student, domain::UpdateError> {
        let student: Student = self
            .fetch_one(self.representation(
                Method::Patch,
                &format!("students?id=eq.{}", *student.id),
                json!({
                    "name": student.name.to_string(),
                    "contact": student.contact,
                    "medical_info": student.medical_info,
                }),
            )?)
            .await?;
        Ok(student.try_into()?)
    }

    async fn delete_student(
        &self,
        id: domain::StudentID,
    ) -> Result<domain::StudentID, domain::DeleteError> {
        self.send(self.request(Method::Delete, &format!("students?id=eq.{}", *id), None)?)
            .await?;
        Ok(id)
    }
}

impl<S: SendRequest> domain::ExerciseRepository for REST<S> {
    async fn read_exercises(&self) -> Result<Vec<domain::Exercise>, domain::ReadError> {
        let exercises: Vec<Exercise> = self
            .fetch(self.request(Method::Get, "exercises?select=*&order=name.asc", None)?)
            .await?;
        Ok(valid_rows(exercises, "exercise"))
    }

    async fn create_exercise(
        &self,
        exercise: domain::Exercise,
    ) -> Result<domain::Exercise, domain::CreateError> {
        let exercise: Exercise = self
            .fetch_one(self.representation(
                Method::Post,
                "exercises",
                json!({
                    "personal_trainer_id": self.trainer_id()?,
                    "name": exercise.name.to_string(),
                    "muscle_group": exercise.muscle_group.to_string(),
                    "description": exercise.description,
                    "image_url": exercise.image_url,
                }),
            )?)
            .await?;
        Ok(exercise.try_into()?)
    }

    async fn replace_exercise(
        &self,
        exercise: domain::Exercise,
    ) -> Result<domain::Exercise, domain::UpdateError> {
        let exercise: Exercise = self
            .fetch_one(self.representation(
                Method::Patch,
                &format!("exercises?id=eq.{}", *exercise.id),
                json!({
                    "name": exercise.name.to_string(),
                    "muscle_group": exercise.muscle_group.to_string(),
                    "description": exercise.description,
                    "image_url": exercise.image_url,
                }),
            )?)
            .await?;
        Ok(exercise.try_into()?)
    }

    async fn delete_exercise(
        &self,
        id: domain::ExerciseID,
    ) -> Result<domain::ExerciseID, domain::DeleteError> {
        self.send(self.request(Method::Delete, &format!("exercises?id=eq.{}", *id), None)?)
            .await?;
        Ok(id)
    }
}

impl<S: SendRequest> domain::WorkoutPlanRepository for REST<S> {
    async fn read_workout_plans(&self) -> Result<Vec<domain::WorkoutPlan>, domain::ReadError> {
        let workouts: Vec<Workout> = self
            .fetch(self.request(
                Method::Get,
                &format!("workouts?select={WORKOUT_SELECT}&order=created_at.desc"),
                None,
            )?)
            .await?;
        Ok(workouts.into_iter().map(domain::WorkoutPlan::from).collect())
    }

    async fn read_workout_plan(
        &self,
        id: domain::WorkoutPlanID,
    ) -> Result<domain::WorkoutPlan, domain::ReadError> {
        let workout: Workout = self
            .fetch_one(self.request(
                Method::Get,
                &format!("workouts?select={WORKOUT_SELECT}&id=eq.{}", *id),
                None,
            )?)
            .await?;
        Ok(workout.into())
    }

    async fn create_workout_plan(
        &self,
        plan: domain::NewWorkoutPlan,
    ) -> Result<domain::WorkoutPlan, domain::CreateError> {
        let workout: Workout = self
            .fetch_one(self.representation(
                Method::Post,
                "workouts?select=*,students(name)",
                json!({
                    "student_id": *plan.student_id,
                    "name": plan.name,
                    "start_date": plan.start_date,
                    "end_date": plan.end_date,
                    "active": plan.active,
                }),
            )?)
            .await?;

        if plan.assignments.is_empty() {
            return Ok(workout.into());
        }

        let rows = plan
            .assignments
            .iter()
            .map(|assignment| {
                json!({
                    "workout_id": workout.id,
                    "exercise_id": *assignment.exercise_id,
                    "week_number": u32::from(assignment.week),
                    "order_index": assignment.order_index,
                })
            })
            .collect::<Vec<_>>();
        let workout_exercises: Result<Vec<WorkoutExercise>, FetchError> = self
            .fetch(self.representation(
                Method::Post,
                "workout_exercises?select=*,exercises(*)",
                Value::Array(rows),
            )?)
            .await;

        match workout_exercises {
            Ok(workout_exercises) => {
                let mut plan = domain::WorkoutPlan::from(workout);
                plan.assignments = workout_exercises
                    .into_iter()
                    .map(domain::Assignment::from)
                    .collect();
                Ok(plan)
            }
            Err(err) => {
                error!(
                    "failed to create exercises of workout plan {}: {err}",
                    workout.id
                );
                let path = format!("workouts?id=eq.{}", workout.id);
                if let Err(err) = self.send(self.request(Method::Delete, &path, None)?).await {
                    error!("failed to remove incomplete workout plan {}: {err}", workout.id);
                }
                Err(err.into())
            }
        }
    }

    async fn modify_workout_plan(
        &self,
        id: domain::WorkoutPlanID,
        name: Option<String>,
        active: Option<bool>,
    ) -> Result<domain::WorkoutPlan, domain::UpdateError> {
        let mut content = Map::new();
        if let Some(name) = name {
            content.insert("name".into(), json!(name));
        }
        if let Some(active) = active {
            content.insert("active".into(), json!(active));
        }
        if content.is_empty() {
            return Ok(self.read_workout_plan(id).await?);
        }
        let workout: Workout = self
            .fetch_one(self.representation(
                Method::Patch,
                &format!("workouts?id=eq.{}&select={WORKOUT_SELECT}", *id),
                Value::Object(content),
            )?)
            .await?;
        Ok(workout.into())
    }

    async fn delete_workout_plan(
        &self,
        id: domain::WorkoutPlanID,
    ) -> Result<domain::WorkoutPlanID, domain::DeleteError> {
        self.send(self.request(Method::Delete, &format!("workouts?id=eq.{}", *id), None)?)
            .await?;
        Ok(id)
    }

    async fn upsert_performance(
        &self,
        assignment_id: domain::AssignmentID,
        performance: domain::Performance,
    ) -> Result<domain::Performance, domain::CreateError> {
        let request = self
            .request(
                Method::Post,
                "performances?on_conflict=workout_exercise_id,record_date",
                Some(json!({
                    "workout_exercise_id": *assignment_id,
                    "weight": performance.weight,
                    "repetitions": performance.reps,
                    "record_date": performance.date,
                })),
            )?
            .with_header("Prefer", "resolution=merge-duplicates,return=representation");
        let performance: Performance = self.fetch_one(request).await?;
        Ok(performance.into())
    }
}

fn valid_rows<T, U>(rows: Vec<T>, entity: &str) -> Vec<U>
where
    U: TryFrom<T, Error = FetchError>,
{
    rows.into_iter()
        .filter_map(|row| {
            U::try_from(row)
                .inspect_err(|err| warn!("ignored {entity}: {err}"))
                .ok()
        })
        .collect()
}

#[derive(thiserror::Error, Debug)]
enum FetchError {
    #[error("no connection")]
    NoConnection,
    #[error("no session")]
    NoSession,
    #[error("not found")]
    NotFound,
    #[error("conflict")]
    Conflict,
    #[error("unexpected status {0}: {1}")]
    Status(u16, String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<FetchError> for domain::ReadError {
    fn from(value: FetchError) -> Self {
        match value {
            FetchError::NoConnection => {
                domain::ReadError::Storage(domain::StorageError::NoConnection)
            }
            FetchError::NoSession => domain::ReadError::Storage(domain::StorageError::NoSession),
            FetchError::NotFound => domain::ReadError::NotFound,
            err => domain::ReadError::Other(err.into()),
        }
    }
}

impl From<FetchError> for domain::CreateError {
    fn from(value: FetchError) -> Self {
        match value {
            FetchError::NoConnection => {
                domain::CreateError::Storage(domain::StorageError::NoConnection)
            }
            FetchError::NoSession => domain::CreateError::Storage(domain::StorageError::NoSession),
            FetchError::Conflict => domain::CreateError::Conflict,
            err => domain::CreateError::Other(err.into()),
        }
    }
}

impl From<FetchError> for domain::UpdateError {
    fn from(value: FetchError) -> Self {
        match value {
            FetchError::NoConnection => {
                domain::UpdateError::Storage(domain::StorageError::NoConnection)
            }
            FetchError::NoSession => domain::UpdateError::Storage(domain::StorageError::NoSession),
            FetchError::Conflict => domain::UpdateError::Conflict,
            err => domain::UpdateError::Other(err.into()),
        }
    }
}

impl From<FetchError> for domain::DeleteError {
    fn from(value: FetchError) -> Self {
        match value {
            FetchError::NoConnection => {
                domain::DeleteError::Storage(domain::StorageError::NoConnection)
            }
            FetchError::NoSession => domain::DeleteError::Storage(domain::StorageError::NoSession),
            err => domain::DeleteError::Other(err.into()),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
struct Student {
    id: Uuid,
    name: String,
    contact: Option<String>,
    medical_info: Option<String>,
}

impl TryFrom<Student> for domain::Student {
    type Error = FetchError;

    fn try_from(value: Student) -> Result<Self, Self::Error> {
        Ok(domain::Student {
            id: value.id.into(),
            name: domain::Name::new(&value.name)
                .map_err(|err| FetchError::InvalidResponse(err.to_string()))?,
            contact: value.contact,
            medical_info: value.medical_info,
        })
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
struct Exercise {
    id: Uuid,
    name: String,
    #[serde(default)]
    muscle_group: String,
    description: Option<String>,
    image_url: Option<String>,
}

impl TryFrom<Exercise> for domain::Exercise {
    type Error = FetchError;

    fn try_from(value: Exercise) -> Result<Self, Self::Error> {
        Ok(domain::Exercise {
            id: value.id.into(),
            name: domain::Name::new(&value.name)
                .map_err(|err| FetchError::InvalidResponse(err.to_string()))?,
            muscle_group: domain::MuscleGroup::new(&value.muscle_group)
                .map_err(|err| FetchError::InvalidResponse(err.to_string()))?,
            description: value.description,
            image_url: value.image_url,
        })
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
struct Workout {
    id: Uuid,
    student_id: Uuid,
    name: Option<String>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    active: Option<bool>,
    created_at: DateTime<Utc>,
    students: Option<StudentName>,
    workout_exercises: Option<Vec<WorkoutExercise>>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
struct StudentName {
    name: Option<String>,
}

impl From<Workout> for domain::WorkoutPlan {
    fn from(value: Workout) -> Self {
        domain::WorkoutPlan {
            id: value.id.into(),
            student_id: value.student_id.into(),
            student_name: value.students.and_then(|student| student.name),
            name: value.name,
            start_date: value.start_date,
            end_date: value.end_date,
            active: value.active.unwrap_or_default(),
            created_at: value.created_at,
            assignments: value
                .workout_exercises
                .unwrap_or_default()
                .into_iter()
                .map(domain::Assignment::from)
                .collect(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
struct WorkoutExercise {
    id: Uuid,
    exercise_id: Uuid,
    week_number: Option<u32>,
    order_index: Option<u32>,
    exercises: Option<Exercise>,
    performances: Option<Vec<Performance>>,
}

impl From<WorkoutExercise> for domain::Assignment {
    fn from(value: WorkoutExercise) -> Self {
        domain::Assignment {
            id: value.id.into(),
            exercise_id: value.exercise_id.into(),
            week: value.week_number.unwrap_or_default(),
            order_index: value.order_index.unwrap_or_default(),
            exercise: value
                .exercises
                .and_then(|exercise| domain::Exercise::try_from(exercise).ok()),
            performances: value
                .performances
                .unwrap_or_default()
                .into_iter()
                .map(domain::Performance::from)
                .collect(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
struct Performance {
    id: Uuid,
    record_date: NaiveDate,
    weight: Option<f32>,
    repetitions: Option<u32>,
}

impl From<Performance> for domain::Performance {
    fn from(value: Performance) -> Self {
        domain::Performance {
            id: value.id.into(),
            date: value.record_date,
            weight: value.weight.unwrap_or_default(),
            reps: value.repetitions.unwrap_or_default(),
        }
    }
}
