//! Model weights, download cache, and device selection.

mod device;
mod loader;

pub use device::Device;
pub use loader::{load_session, ModelCache, ModelSpec, LAMA};
