mod actor;
mod handle;
mod protocol;

pub use handle::{spawn_miner, MinerHandle, MinerServices};
