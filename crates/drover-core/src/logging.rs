//! Logging facilities for Drover.
//!
//! Drover uses the `tracing` crate for instrumentation. To see logs, install
//! a tracing subscriber in the host application:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt::init();
//!
//!     // Your application code...
//! }
//! ```
//!
//! The constants in [`targets`] can be used with `tracing` directives to
//! filter logs by subsystem, e.g. `RUST_LOG=drover::validate=trace`.

/// Target names for log filtering.
pub mod targets {
    /// Core crate target.
    pub const CORE: &str = "drover_core";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "drover_core::signal";
    /// Schema derivation target.
    pub const SCHEMA: &str = "drover::schema";
    /// Field validation target (sync and async).
    pub const VALIDATE: &str = "drover::validate";
    /// Collection sub-editor target.
    pub const COLLECTION: &str = "drover::collection";
    /// Step navigation target.
    pub const STEPS: &str = "drover::steps";
    /// Submission orchestration target.
    pub const SUBMIT: &str = "drover::submit";
    /// Alert channel target.
    pub const ALERT: &str = "drover::alert";
    /// Reference-data lookup target.
    pub const LOOKUP: &str = "drover::lookup";
    /// HTTP boundary target.
    pub const NET: &str = "drover_net";
}
