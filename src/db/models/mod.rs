pub mod latest;
pub mod location;
pub mod observation;
pub mod raw_response;

pub use latest::{LatestSnapshot, SnapshotStats};
pub use location::Location;
pub use observation::Observation;
pub use raw_response::{NewRawResponse, RawResponse};
