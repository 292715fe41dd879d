pub mod adapter;
pub mod curate;
pub mod dedup;
pub mod expansion;
pub mod location;
pub mod orchestrator;
pub mod protocol;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use adapter::{EventSource, FetchConstraints, ListingFileSource};
pub use curate::{curate, CurationPolicy};
pub use dedup::{DedupAccumulator, IngestOutcome};
pub use expansion::{search, SearchOptions};
pub use location::{Geocoder, IpLocator, LocationResolver, NominatimGeocoder, IpApiLocator};
pub use orchestrator::{AdapterStatus, Orchestrator, RunPhase};
pub use protocol::{ErrorKind, ScraperErrorReason, StreamMessage};
