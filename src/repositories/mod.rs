pub(crate) mod assignments;
pub(crate) mod attempt_histories;
pub(crate) mod generation_requests;
pub(crate) mod questions;
pub(crate) mod quizzes;
pub(crate) mod users;
