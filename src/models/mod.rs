pub mod diagnostics;
pub mod error;
pub mod events;
pub mod health;
pub mod membership;
pub mod presence;
pub mod room;
pub mod room_api;
pub mod user;

pub use diagnostics::*;
pub use error::*;
pub use events::*;
pub use health::*;
pub use membership::*;
pub use presence::*;
pub use room::*;
pub use room_api::*;
pub use user::*;
