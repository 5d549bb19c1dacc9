pub mod controller;
pub mod error;
pub mod http;
pub mod poll;
pub mod progress;
pub mod repository;
pub mod store;
pub mod transcript;
pub mod types;

pub use controller::{CampaignController, ControllerView, LogState, PollTicket};
pub use error::*;
pub use poll::{DEFAULT_POLL_INTERVAL, PollingScheduler};
pub use repository::CampaignRepository;
pub use store::CampaignStore;
pub use types::*;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!version().is_empty());
    }
}
