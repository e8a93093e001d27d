//! Message trait and lineage
//!
//! Rust has no class inheritance, so a message declares the ancestor views
//! it can be delivered as. A view is the same value seen through another
//! type, usually a trait object: a `LinkDown` struct can be delivered to
//! subscribers of `LinkDown` itself, of `dyn LinkEvent` and of
//! `dyn CommunicationEvent`.

use std::any::{Any, TypeId};
use std::sync::Arc;

/// A value that can be published on the bus
///
/// The runtime type is always part of the lineage. Implement
/// [`Message::lineage`] (or use the [`message!`](crate::message) macro) to add
/// ancestor views.
pub trait Message: Send + Sync + 'static {
    /// Add the ancestor views of this message to `lineage`.
    fn lineage(self: Arc<Self>, lineage: &mut Lineage) {
        let _ = lineage;
    }
}

/// One way of looking at a published message
pub(crate) struct MessageView {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    /// Holds an `Arc<U>` where `U` is the view type
    pub(crate) value: Arc<dyn Any + Send + Sync>,
}

/// Every type a message is delivered as, runtime type first
#[derive(Default)]
pub struct Lineage {
    views: Vec<MessageView>,
}

impl Lineage {
    pub(crate) fn of<M: Message>(message: Arc<M>) -> Self {
        let mut lineage = Lineage::default();
        lineage.include::<M>(message.clone());
        message.lineage(&mut lineage);
        lineage
    }

    /// Add a view of the message as `U`. Adding the same view twice is a no-op.
    pub fn include<U>(&mut self, view: Arc<U>)
    where
        U: ?Sized + Send + Sync + 'static,
    {
        let type_id = TypeId::of::<U>();
        if self.views.iter().any(|v| v.type_id == type_id) {
            return;
        }
        self.views.push(MessageView {
            type_id,
            type_name: std::any::type_name::<U>(),
            value: Arc::new(view),
        });
    }

    pub fn contains<U: ?Sized + 'static>(&self) -> bool {
        let type_id = TypeId::of::<U>();
        self.views.iter().any(|v| v.type_id == type_id)
    }

    pub fn type_names(&self) -> Vec<&'static str> {
        self.views.iter().map(|v| v.type_name).collect()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub(crate) fn views(&self) -> &[MessageView] {
        &self.views
    }

    /// Name of the runtime type
    pub(crate) fn runtime_type_name(&self) -> &'static str {
        self.views.first().map(|v| v.type_name).unwrap_or("<empty>")
    }
}

/// Implement [`Message`] for a type, optionally listing its ancestor views.
///
/// ```ignore
/// message!(Heartbeat);
/// message!(LinkDown: dyn LinkEvent, dyn CommunicationEvent);
/// ```
#[macro_export]
macro_rules! message {
    ($ty:ty : $($ancestor:ty),+ $(,)?) => {
        impl $crate::messaging::api::Message for $ty {
            fn lineage(
                self: ::std::sync::Arc<Self>,
                lineage: &mut $crate::messaging::api::Lineage,
            ) {
                $( lineage.include::<$ancestor>(self.clone()); )+
            }
        }
    };
    ($ty:ty) => {
        impl $crate::messaging::api::Message for $ty {}
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Event: Send + Sync {
        fn code(&self) -> u32;
    }

    trait Alarm: Event {}

    struct Plain;

    struct Raised {
        code: u32,
    }

    impl Event for Raised {
        fn code(&self) -> u32 {
            self.code
        }
    }

    impl Alarm for Raised {}

    crate::message!(Plain);
    crate::message!(Raised: dyn Event, dyn Alarm);

    #[test]
    fn test_lineage_of_plain_message_is_runtime_type_only() {
        let lineage = Lineage::of(Arc::new(Plain));
        assert_eq!(lineage.len(), 1);
        assert!(lineage.contains::<Plain>());
        assert!(!lineage.contains::<dyn Event>());
    }

    #[test]
    fn test_lineage_includes_declared_ancestors_in_order() {
        let lineage = Lineage::of(Arc::new(Raised { code: 7 }));
        assert_eq!(lineage.len(), 3);
        assert!(lineage.contains::<Raised>());
        assert!(lineage.contains::<dyn Event>());
        assert!(lineage.contains::<dyn Alarm>());
        assert!(lineage.runtime_type_name().ends_with("Raised"));
    }

    #[test]
    fn test_views_downcast_to_ancestor() {
        let lineage = Lineage::of(Arc::new(Raised { code: 7 }));
        let view = lineage
            .views()
            .iter()
            .find(|v| v.type_id == TypeId::of::<dyn Event>())
            .unwrap();
        let event = view.value.downcast_ref::<Arc<dyn Event>>().unwrap();
        assert_eq!(event.code(), 7);
    }

    #[test]
    fn test_duplicate_views_are_ignored() {
        let message = Arc::new(Raised { code: 1 });
        let mut lineage = Lineage::default();
        lineage.include::<dyn Event>(message.clone());
        lineage.include::<dyn Event>(message);
        assert_eq!(lineage.len(), 1);
    }
}
