pub mod config;
pub mod scanner;
pub mod reader;
pub mod probe;
pub mod discovery;
pub mod snapshot;
pub mod context;
pub mod history;
pub mod llm;
pub mod notice;
pub mod retry;
pub mod prompts;
pub mod router;
pub mod watcher;
pub mod session;

pub use config::{load_config, Config};
pub use context::{CacheInvalidator, ContextAggregator};
pub use llm::{AnthropicClient, ModelClient, ModelError, ModelRequest};
pub use router::{route, Domain, Route};
pub use session::{Reply, Services, Session};
