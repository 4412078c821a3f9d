pub mod gateway;
pub mod identity;
pub mod room;

pub use gateway::{ClientEvent, PeerInfo, ServerEvent};
pub use identity::{Identity, UserType};
pub use room::{Participant, RoomRole, RoomSnapshot};
