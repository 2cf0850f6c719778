pub mod actions;
pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod feed;
pub mod staging;
pub mod state;
pub mod upload;

use tracing_subscriber::{fmt, EnvFilter};

pub use api::{Credential, HttpStoryApi, SharedApi, StoryApi};
pub use config::ClientConfig;
pub use error::ClientError;
pub use events::{EventReceiver, EventSender, StoryEvent};
pub use feed::{group_by_author, SharedFeed, StoryFeed, StoryPatch};
pub use staging::{MediaSource, StagedMedia};
pub use state::AppState;
pub use upload::{ProgressFn, ProgressTracker, UploadPipeline, UploadStatus, UploadTask};

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("placestory=info,placestory_client_lib=debug,placestory_media=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
