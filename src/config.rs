//! Runtime configuration resolved from the environment.

use std::time::Duration;

/// Tunables for ingestion, context assembly, and the invalidation channel.
///
/// `Default` resolves overridable values from the environment (after loading
/// `.env` via dotenvy), falling back to the constants the surrounding chat
/// application has always used.
#[derive(Clone, Debug)]
pub struct DocloomConfig {
    /// Connection string for the backing SQLite database.
    pub database_url: String,
    /// Pub/sub channel name carrying pipeline invalidation messages.
    pub invalidation_channel: String,
    /// Deadline applied to every outbound URL fetch.
    pub fetch_timeout: Duration,
    /// Identifying user agent sent with every fetch.
    pub user_agent: String,
    /// Titles longer than this are truncated with an ellipsis marker.
    pub title_max_chars: usize,
    /// Length of the stored document preview.
    pub preview_max_chars: usize,
    /// Word window used when chunking documents for context assembly.
    pub chunk_window: usize,
    /// Word overlap between consecutive context chunks.
    pub chunk_overlap: usize,
}

impl Default for DocloomConfig {
    fn default() -> Self {
        Self {
            database_url: Self::resolve_env("DOCLOOM_DATABASE_URL", "sqlite:docloom.db"),
            invalidation_channel: Self::resolve_env(
                "DOCLOOM_INVALIDATION_CHANNEL",
                "pipeline_invalidation",
            ),
            fetch_timeout: Duration::from_secs(30),
            user_agent: "Mozilla/5.0 (compatible; DocloomBot/1.0)".to_string(),
            title_max_chars: 200,
            preview_max_chars: 500,
            chunk_window: 500,
            chunk_overlap: 50,
        }
    }
}

impl DocloomConfig {
    fn resolve_env(key: &str, fallback: &str) -> String {
        dotenvy::dotenv().ok();
        std::env::var(key).unwrap_or_else(|_| fallback.to_string())
    }

    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_chunking(mut self, window: usize, overlap: usize) -> Self {
        self.chunk_window = window;
        self.chunk_overlap = overlap;
        self
    }
}
