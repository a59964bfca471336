//! Shared primitives for the cardbridge crates: legacy row ids, validated card requests,
//! device membership vectors and the error currency every layer converts into.

pub mod card;
pub mod clock;
pub mod device;
pub mod door;
pub mod duration;
pub mod error;
pub mod ids;
pub mod request;

pub use card::{CardCode, CorrelationKey};
pub use clock::{never_expires, Clock, FixedClock, SystemClock};
pub use device::{DeviceSet, DEVICE_UNIVERSE};
pub use door::{DoorController, DoorState};
pub use error::{BridgeError, ErrorKind};
pub use ids::{
    AclId, CardId, ComboId, CompanyId, DeviceGroupId, LocationId, NameId, PermissionNameId,
    RequestId, TimeZoneId, UdfNum,
};
pub use request::{
    CardAction, CardRequest, Enrollment, RawCardRequest, RequestMethod, RequestStatus,
};
