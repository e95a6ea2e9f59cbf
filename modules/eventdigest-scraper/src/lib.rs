pub mod blocked;
pub mod detail;
pub mod document;
pub mod listing;
pub mod markdown;
pub mod search;

pub use detail::{DetailEnricher, DetailFetcher};
pub use listing::{EventSource, ListingScraper};
pub use search::{NoopSearcher, SerperSearcher, WebSearcher};
