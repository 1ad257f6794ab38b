pub mod config;
pub mod error;
pub mod model;
pub mod provider;
pub mod selection;
pub mod server;
pub mod state;
pub mod view;

pub use config::{LlmDeckConfig, OllamaConfig, PollConfig, ServerConfig};
pub use error::{LlmDeckError, Result};
pub use model::{display_name, find_by_display_name, ModelEntry, DEFAULT_MODEL_NAME};
pub use provider::ProviderState;
pub use selection::SelectionState;
pub use server::ServerState;
pub use state::{PanelEvent, PanelState, Query, SharedState, Staleness};
pub use view::PanelView;
