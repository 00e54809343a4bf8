pub mod clock;
pub mod constants;
pub mod controller;
pub mod envelope;
pub mod error;
pub mod graph;
pub mod program;
pub mod scheduler;
pub mod session;
pub mod timeline;

pub use clock::*;
pub use constants::*;
pub use controller::*;
pub use envelope::*;
pub use error::*;
pub use graph::*;
pub use program::*;
pub use scheduler::*;
pub use session::*;
pub use timeline::*;
