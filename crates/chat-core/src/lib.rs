pub mod config;
pub mod dispatcher;
pub mod generator;
pub mod reporter;
pub mod simulation;
pub mod stats;
pub mod submitter;
pub mod templates;

pub use config::*;
pub use dispatcher::*;
pub use generator::*;
pub use reporter::*;
pub use simulation::*;
pub use stats::*;
pub use submitter::*;
pub use templates::*;
