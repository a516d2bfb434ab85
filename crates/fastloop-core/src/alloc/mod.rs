//! Arena, bump and fixed-size allocators
//!
//! None of these are internally synchronized. Each instance belongs to one
//! owner, or is only touched while that owner's lock is held.
//!
//! - [`Region`] owns a chain of raw blocks and frees them all at once
//! - [`Bin`] carves small allocations out of Region pages, never freed piecewise
//! - [`Pool`] hands out generation-checked slots for one value type

mod bin;
mod pool;
mod region;

pub use bin::Bin;
pub use pool::{Pool, PoolKey};
pub use region::Region;
