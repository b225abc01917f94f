mod config;
mod dispatcher;
mod matchmaker;
mod registry;
pub mod relay;
mod room;
mod snapshot;
mod supervisor;
mod timer;

pub use config::{
    SupervisorConfig, DEFAULT_COMMAND_CAPACITY, DEFAULT_OUTBOUND_CAPACITY, DEFAULT_PAIRING_TIMEOUT,
};
pub use dispatcher::{EventDispatcher, InboundEventHandler};
pub use matchmaker::{Matchmaker, PairingOutcome};
pub use registry::ConnectionRegistry;
pub use relay::Confirmation;
pub use room::{Room, RoomTable};
pub use snapshot::{ClientSnapshot, RoomSnapshot, SessionSnapshot};
pub use supervisor::{SessionCommand, SessionSupervisor, SupervisorHandle};
pub use timer::PairingTimer;
