pub mod diagnostics;
pub mod health;
pub mod room_create;
pub mod room_detail;
pub mod room_end;
pub mod room_list;
pub mod room_update;

pub use diagnostics::*;
pub use health::*;
pub use room_create::*;
pub use room_detail::*;
pub use room_end::*;
pub use room_list::*;
pub use room_update::*;
