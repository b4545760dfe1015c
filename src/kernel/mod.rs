pub mod config;
pub mod correlator;
pub mod error;
pub mod event;
pub mod ingest;
pub mod metrics;
pub mod observation;
pub mod reactor;
pub mod resolver;
pub mod scorer;
pub mod session;
pub mod time;
