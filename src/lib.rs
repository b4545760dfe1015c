pub mod kernel;

// Re-export the driver-facing surface
pub use kernel::metrics::MetricSnapshot;
pub use kernel::reactor::Reactor;
pub use kernel::scorer::{score, Rubric, ScoreCard};
pub use kernel::session::SessionController;
