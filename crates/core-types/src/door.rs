use crate::error::BridgeError;

/// Override states understood by the comm server's door command.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum DoorState {
    Open,
    Secure,
    /// Hand the door back to its time-zone schedule.
    TimeZone,
}

impl DoorState {
    pub fn code(self) -> u8 {
        match self {
            DoorState::Open => 1,
            DoorState::Secure => 2,
            DoorState::TimeZone => 3,
        }
    }
}

/// Door override capability owned by the surrounding service; the engine never calls it.
pub trait DoorController: Send + Sync {
    fn set_state(&self, door: u32, state: DoorState) -> Result<(), BridgeError>;
}
