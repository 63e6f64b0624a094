//! Ensemble aggregation
//!
//! [`EnsembleAggregator`] checks that a search context selects the
//! realizations of exactly one object (same case, class, iteration, name,
//! tagname and content, no existing aggregates among them), then asks the
//! aggregation service to reduce them. The result is a derived object whose
//! metadata is built from one of the members and whose blob is the service's
//! payload.
//!
//! ```no_run
//! use sumo_explorer::search::Filter;
//! use sumo_explorer::{Explorer, ExplorerConfig};
//!
//! # async fn run() -> sumo_explorer::Result<()> {
//! let explorer = Explorer::new(ExplorerConfig::load()?)?;
//! let members = explorer
//!     .context()
//!     .surfaces()
//!     .filter(&Filter::new().name("VOLANTIS GP. Top").tagname("FACIES_Fraction_Channel").iteration("iter-0"))
//!     .await?;
//! let mean = members.aggregator().aggregate(None, "mean").await?;
//! let bytes = mean.to_binary().await?;
//! # Ok(())
//! # }
//! ```

mod archive;
mod ensemble;

pub use archive::unpack;
pub use ensemble::{EnsembleAggregator, OPERATIONS};
