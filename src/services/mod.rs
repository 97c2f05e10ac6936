pub(crate) mod grading_rules;
pub(crate) mod notifications;
pub(crate) mod quiz_catalog;
pub(crate) mod quiz_generation;
pub(crate) mod quiz_scoring;
pub(crate) mod telegram;
