//! The core pipeline library: record model, decoders, transports, publishers, workers, the
//! monitor, and the supervisor that wires them together. Command-line parsing and environment
//! bootstrapping live in `flowgate-cli`; this crate only knows about an already-resolved
//! [`config::AppConfig`].

pub mod config;
pub mod decode;
pub mod governor;
pub mod metrics;
pub mod monitor;
pub mod publish;
pub mod record;
pub mod serialize;
pub mod source;
pub mod supervisor;
pub mod transport;
pub mod workers;

pub use config::AppConfig;
pub use supervisor::run;
