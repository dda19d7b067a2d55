mod geo;
mod handoff;

pub use geo::{haversine_km, EARTH_RADIUS_KM};
pub use handoff::{new_handoff_code, HANDOFF_CODE_LENGTH};
