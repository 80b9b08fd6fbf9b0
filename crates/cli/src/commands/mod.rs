//! Command implementations.

mod info;
mod mock_peer;
mod run;
mod validate;

pub use info::run_info;
pub use mock_peer::run_mock_peer;
pub use run::run_bridge;
pub use validate::run_validate;
