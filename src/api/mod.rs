pub(crate) mod ai;
pub(crate) mod auth;
pub(crate) mod children;
pub(crate) mod errors;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod pagination;
pub(crate) mod quizzes;
pub(crate) mod router;
pub(crate) mod students;
pub(crate) mod validation;
