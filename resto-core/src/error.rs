use thiserror::Error;

/// Failure taxonomy shared by the services. Business logic never retries:
/// persistence and conflict failures are retried only through broker
/// redelivery, and publish failures are surfaced to the caller verbatim.
#[derive(Error, Debug)]
pub enum Error {
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("worker already online")]
    WorkerAlreadyOnline,

    #[error("order already cooking")]
    AlreadyCooking,

    #[error("persistence error: {0}")]
    Persistence(#[from] diesel::result::Error),

    #[error("publish error: {0}")]
    Publish(#[from] lapin::Error),
}
