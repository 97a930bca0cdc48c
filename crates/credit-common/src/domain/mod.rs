//! Credit Domain Model
//!
//! - **Value Objects**: GrantId, Period
//! - **Granularity**: WindowSize, the resolution of the usage backend

pub mod value_objects;
pub mod window;

pub use value_objects::*;
pub use window::*;
