pub mod backup;
pub mod catalog;
pub mod core;
pub mod reports;
pub mod scores;
pub mod students;
