mod account;
mod fill;
mod order;
mod order_status;
mod order_type;
mod position;
mod quote;
mod side;
mod signal;
mod time_in_force;

pub use account::AccountSnapshot;
pub use fill::Fill;
pub use order::{FillOutcome, Order, OrderId, TransitionError};
pub use order_status::OrderStatus;
pub use order_type::OrderType;
pub use position::PositionRecord;
pub use quote::Quote;
pub use side::Side;
pub use signal::{Direction, Signal, SignalId};
pub use time_in_force::TimeInForce;
