pub mod activation;
pub mod event;
pub mod ledger;
pub mod location;
pub mod trip;
