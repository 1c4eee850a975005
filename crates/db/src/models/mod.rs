pub mod assignment_history;
pub mod case;
pub mod comment;
pub mod dashboard;
pub mod lookup;
pub mod user;
