pub mod processor;
pub mod reconciler;
pub mod report;
