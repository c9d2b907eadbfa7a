pub mod activation;
pub mod admin;
pub mod emergency;
pub mod heading;
pub mod ingest;
pub mod lifecycle;
pub mod locks;
pub mod progress;
pub mod queue;
