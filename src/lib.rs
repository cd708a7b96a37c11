pub mod cancel;
pub mod compat;
pub mod config;
pub mod error;
pub mod executor;
pub mod hashing;
pub mod logging;
pub mod package;
pub mod registry;
pub mod resolver;
pub mod timestamp;
pub mod transport;

#[cfg(test)]
mod testing;

pub use cancel::CancelToken;
pub use error::{Error, UpdateError};
pub use executor::{ApplyReport, UpdateExecutor};
pub use package::{LocalPackage, Loader, LookupConstraints, Registry, UpdateCandidate};
pub use resolver::UpdateResolver;
