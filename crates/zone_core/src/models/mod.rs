pub mod gps;
pub mod run;
pub mod zone;

pub use gps::{GeoPoint, GpsPoint};
pub use run::{RunRejection, ValidatedRun};
pub use zone::{Zone, ZoneId};
