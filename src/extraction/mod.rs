pub mod backend;
pub mod gemini;
pub mod traits;
pub mod types;

pub use backend::HttpSearchBackend;
pub use gemini::GeminiExtractor;
pub use traits::{Extractor, SearchBackend};
pub use types::{candidate_schema, SearchRequest};
