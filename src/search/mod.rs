//! Lazy, filterable, cached and paginated search over the Sumo index
//!
//! This module turns declarative filters into backend queries and resolves
//! their results on demand:
//!
//! - **Filters**: named filter arguments compiled into boolean query clauses
//! - **Search contexts**: immutable clause sets with memoized ids, counts and
//!   distinct field values
//! - **Deep pagination**: point-in-time snapshots and `search_after` cursors
//!   for result sets larger than one page
//! - **Bucket enumeration**: terms aggregations with a composite fallback
//! - **Caching**: bounded LRU of fetched documents with read-ahead while
//!   iterating
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │  SearchContext / BlockingSearchContext          │
//! │  - filter()    - length()    - uuids()          │
//! │  - get()       - cursor()    - field_values()   │
//! └─────────────────────────────────────────────────┘
//!        │                 │                 │
//!        ▼                 ▼                 ▼
//! ┌──────────────┐ ┌───────────────┐ ┌───────────────┐
//! │  Paginator   │ │BucketEnumerator│ │  ResultCache  │
//! └──────────────┘ └───────────────┘ └───────────────┘
//!        │                 │
//!        ▼                 ▼
//! ┌─────────────────────────────────────────────────┐
//! │  Snapshot (point-in-time handle, always closed) │
//! └─────────────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────────────┐
//! │  SearchBackend (SumoClient over HTTP)           │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use sumo_explorer::search::Filter;
//! use sumo_explorer::{Explorer, ExplorerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let explorer = Explorer::new(ExplorerConfig::load()?)?;
//!
//!     let surfaces = explorer
//!         .context()
//!         .surfaces()
//!         .filter(&Filter::new().iteration("iter-0").realization(true))
//!         .await?;
//!
//!     println!("{} realization surfaces", surfaces.length().await?);
//!     for name in surfaces.names().await? {
//!         println!("{}", name);
//!     }
//!
//!     Ok(())
//! }
//! ```

mod blocking;
mod buckets;
mod cache;
mod context;
mod filters;
mod metrics;
mod paginator;
mod query;
mod snapshot;
mod time;

pub use blocking::{BlockingIter, BlockingMetrics, BlockingSearchContext};
pub use buckets::{Bucket, BucketEnumerator, CompositeBucket};
pub use cache::ResultCache;
pub use context::{ContextCursor, SearchContext, PARENT_ID_FIELD};
pub use filters::{
    compile, filter_kind, filter_names, predefined, Filter, FilterArg, FilterKind, FilterValue,
    HasPredicate,
};
pub use metrics::Metrics;
pub use paginator::{total_hits, Paginator, PaginatorState, Projection};
pub use query::{ids_clause, Query};
pub use snapshot::Snapshot;
pub use time::{TimeFilter, TimeType};

pub(crate) use paginator::hit_id;
