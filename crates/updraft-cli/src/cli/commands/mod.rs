//! CLI command handlers, one file per command.

mod check;
mod checksum;
mod run;
mod status;

pub use check::run_check;
pub use checksum::run_checksum;
pub use run::run_update;
pub use status::run_status;
