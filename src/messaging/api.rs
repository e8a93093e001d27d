//! Public API for the messaging bus

pub use crate::messaging::bus::{DeliveryReport, MessageBus};
pub use crate::messaging::error::{MessagingError, MessagingResult};
pub use crate::messaging::handler::{Filter, Handler, HandlerError, HandlerResult};
pub use crate::messaging::message::{Lineage, Message};
