pub(crate) mod generation;
pub(crate) mod notifications;
pub(crate) mod scheduler;
