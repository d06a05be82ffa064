use crate::config::Config;

/// Shared, read-only service state.
pub struct AppState {
    pub config: Config,
}
