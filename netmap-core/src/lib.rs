pub mod counters;
pub mod error;
pub mod export;
pub mod graph;
pub mod index;
pub mod keys;
pub mod model;
pub mod pool;
pub mod query;
pub mod store;
pub mod urls;

pub use error::{NetworkMapError, Result};
pub use export::{NetworkMapExport, ResourceLine};
pub use graph::{GraphBuilder, NetworkGraph};
pub use index::{IndexOptions, IndexSummary, Indexer, execute_index};
pub use model::{BuildMarker, Node, NodeKind, SearchCommand};
pub use pool::{DEFAULT_POOL_SIZE, StorePool};
pub use query::NetworkMapService;
pub use store::{Direction, GraphStore, RecordIterator};
