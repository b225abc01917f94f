pub mod model;
pub mod session;

#[cfg(feature = "server")]
pub mod server;

pub mod prelude {
    pub use crate::model::ClientId;
    pub use crate::model::ClientState;
    pub use crate::model::InboundEvent;
    pub use crate::model::OutboundEvent;
    pub use crate::model::RelayMessage;
    pub use crate::model::RoomId;
    pub use crate::model::SignalingError;
    pub use crate::session::EventDispatcher;
    pub use crate::session::InboundEventHandler;
    pub use crate::session::SessionSupervisor;
    pub use crate::session::SupervisorConfig;
    pub use crate::session::SupervisorHandle;
}
