//! Platform collaborators: filesystem access and volume capacity.

pub mod capacity;
pub mod fs;
