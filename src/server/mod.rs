pub mod daemon;
pub mod ipc;
pub mod protocol;
pub mod router;

pub use ipc::ControlServer;
pub use protocol::{ControlMessage, Outbound};
pub use router::ControlRouter;
