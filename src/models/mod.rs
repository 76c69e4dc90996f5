mod notification;
mod order;
mod payment_event;

pub use notification::*;
pub use order::*;
pub use payment_event::*;
