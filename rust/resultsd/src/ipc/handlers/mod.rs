pub mod attendance;
pub mod classes;
pub mod comments;
pub mod core;
pub mod grading;
pub mod promotion;
pub mod psychomotor;
pub mod ranking;
pub mod reports;
pub mod scores;
pub mod students;
pub mod subjects;
