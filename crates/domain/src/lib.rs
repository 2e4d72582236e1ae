#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

mod error;
mod exercise;
mod history;
mod name;
mod service;
mod statistics;
mod student;
mod workout;

pub use error::*;
pub use exercise::*;
pub use history::*;
pub use name::*;
pub use service::*;
pub use statistics::*;
pub use student::*;
pub use workout::*;
