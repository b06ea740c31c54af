pub mod broadcaster;
pub mod channel;
pub mod models;
pub mod poll_store;
pub mod reducer;
pub mod updates;

pub use broadcaster::*;
pub use channel::*;
pub use models::*;
pub use poll_store::*;
pub use reducer::*;
pub use updates::*;
