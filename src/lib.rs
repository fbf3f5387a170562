//! Scenarist core library: scenario definitions, the execution engine and
//! report types shared by the CLI and embedding test code.

#[path = "platform/config.rs"]
mod config;
#[path = "runtime/cursor.rs"]
mod cursor;
#[path = "model/dsl.rs"]
mod dsl;
#[path = "runtime/engine.rs"]
mod engine;
#[path = "platform/error.rs"]
mod error;
#[path = "model/errors.rs"]
mod errors;
#[path = "platform/fsutil.rs"]
mod fsutil;
#[path = "runtime/handlers.rs"]
mod handlers;
#[path = "platform/location.rs"]
mod location;
#[path = "model/report.rs"]
mod report;
#[path = "cmd/run_cmd.rs"]
mod run_cmd;
#[path = "model/scenario.rs"]
mod scenario;
#[path = "runtime/stats.rs"]
mod stats;
#[path = "model/status.rs"]
mod status;
#[path = "runtime/store.rs"]
mod store;
#[path = "runtime/verdict.rs"]
mod verdict;

pub use config::*;
pub use cursor::*;
pub use dsl::*;
pub use engine::*;
pub use error::*;
pub use errors::*;
pub use fsutil::*;
pub use handlers::*;
pub use location::*;
pub use report::*;
pub use run_cmd::*;
pub use scenario::*;
pub use stats::*;
pub use status::*;
pub use store::*;
pub use verdict::*;
