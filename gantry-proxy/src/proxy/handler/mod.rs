pub mod forward;
pub mod types;

pub use forward::ForwardHandler;
