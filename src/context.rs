//! The `Context` hosts the single-threaded event loop that every other module plugs into.
//!
//! It owns three kinds of pending work and runs them in a fixed order:
//! * callbacks queued with [`Context::queue_callback`], including event handlers, which always
//!   run before time advances;
//! * plans scheduled with [`Context::add_plan`], executed in time order;
//! * nothing else: when both queues are empty, [`Context::execute`] returns.
//!
//! Module state lives in data plugins (see [`define_data_plugin!`](crate::define_data_plugin)),
//! and modules expose their behavior as `Context*Ext` extension traits.
use std::any::{Any, TypeId};
use std::collections::VecDeque;
use std::rc::Rc;

use log::trace;

use crate::hashing::HashMap;
use crate::plan::Queue;

/// A type that can be emitted through [`Context::emit_event`]. Handlers receive a clone.
pub trait Event: Clone + 'static {}

/// A module's state container, created lazily the first time it is requested.
pub trait DataPlugin: Any {
    type DataContainer;

    fn create_data_container() -> Self::DataContainer;
}

type Callback = dyn FnOnce(&mut Context);
type EventHandler<E> = dyn Fn(&mut Context, E);

pub struct Context {
    plan_queue: Queue<Box<Callback>>,
    callback_queue: VecDeque<Box<Callback>>,
    event_handlers: HashMap<TypeId, Box<dyn Any>>,
    data_plugins: HashMap<TypeId, Box<dyn Any>>,
    current_time: f64,
}

impl Context {
    #[must_use]
    pub fn new() -> Context {
        Context {
            plan_queue: Queue::new(),
            callback_queue: VecDeque::new(),
            event_handlers: HashMap::default(),
            data_plugins: HashMap::default(),
            current_time: 0.0,
        }
    }

    /// Schedules `callback` to run at `time`. Plans due at the same time run in the order they
    /// were added.
    ///
    /// # Panics
    ///
    /// Panics if `time` is not finite or lies in the past.
    pub fn add_plan(&mut self, time: f64, callback: impl FnOnce(&mut Context) + 'static) {
        assert!(
            time.is_finite() && time >= self.current_time,
            "Invalid time value"
        );
        trace!("adding plan at {time}");
        self.plan_queue.add_plan(time, Box::new(callback));
    }

    /// Queues `callback` to run before any further plan.
    pub fn queue_callback(&mut self, callback: impl FnOnce(&mut Context) + 'static) {
        self.callback_queue.push_back(Box::new(callback));
    }

    /// Registers a handler for events of type `E`. Handlers run as queued callbacks, in
    /// subscription order, never re-entrantly inside `emit_event`.
    pub fn subscribe_to_event<E: Event>(&mut self, handler: impl Fn(&mut Context, E) + 'static) {
        let handlers = self
            .event_handlers
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::<Vec<Rc<EventHandler<E>>>>::default());
        handlers
            .downcast_mut::<Vec<Rc<EventHandler<E>>>>()
            .expect("event handler registry holds the wrong type")
            .push(Rc::new(handler));
    }

    /// Queues every subscribed handler for `event`. Does nothing if there are none.
    pub fn emit_event<E: Event>(&mut self, event: E) {
        let Some(handlers) = self.event_handlers.get(&TypeId::of::<E>()) else {
            return;
        };
        let handlers = handlers
            .downcast_ref::<Vec<Rc<EventHandler<E>>>>()
            .expect("event handler registry holds the wrong type")
            .clone();
        for handler in handlers {
            let event = event.clone();
            self.queue_callback(move |context| handler(context, event));
        }
    }

    /// Returns the plugin's container, creating it on first use.
    pub fn get_data_mut<T: DataPlugin>(&mut self, _plugin: T) -> &mut T::DataContainer {
        self.data_plugins
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::create_data_container()))
            .downcast_mut::<T::DataContainer>()
            .expect("data plugin holds the wrong container type")
    }

    /// Returns the plugin's container if it has been created.
    #[must_use]
    pub fn get_data<T: DataPlugin>(&self, _plugin: T) -> Option<&T::DataContainer> {
        self.data_plugins
            .get(&TypeId::of::<T>())
            .and_then(|container| container.downcast_ref::<T::DataContainer>())
    }

    #[must_use]
    pub fn get_current_time(&self) -> f64 {
        self.current_time
    }

    /// Runs queued callbacks and plans until there is no work left.
    pub fn execute(&mut self) {
        loop {
            if let Some(callback) = self.callback_queue.pop_front() {
                callback(self);
                continue;
            }

            match self.plan_queue.get_next_plan() {
                Some(plan) => {
                    self.current_time = plan.time;
                    (plan.data)(self);
                }
                None => break,
            }
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::define_data_plugin;

    define_data_plugin!(ComponentA, Vec<u32>, vec![]);

    #[derive(Clone)]
    struct Ping(u32);
    impl Event for Ping {}

    fn add_plan(context: &mut Context, time: f64, value: u32) {
        context.add_plan(time, move |context| {
            context.get_data_mut(ComponentA).push(value);
        });
    }

    #[test]
    #[should_panic(expected = "Invalid time value")]
    fn negative_plan_time() {
        let mut context = Context::new();
        add_plan(&mut context, -1.0, 0);
    }

    #[test]
    #[should_panic(expected = "Invalid time value")]
    fn nan_plan_time() {
        let mut context = Context::new();
        add_plan(&mut context, f64::NAN, 0);
    }

    #[test]
    fn empty_context() {
        let mut context = Context::new();
        context.execute();
        assert_eq!(context.get_current_time(), 0.0);
        assert!(context.get_data(ComponentA).is_none());
    }

    #[test]
    fn callback_before_timed_plan() {
        let mut context = Context::new();
        add_plan(&mut context, 1.0, 2);
        context.queue_callback(|context| {
            context.get_data_mut(ComponentA).push(1);
        });
        context.execute();
        assert_eq!(context.get_current_time(), 1.0);
        assert_eq!(*context.get_data_mut(ComponentA), vec![1, 2]);
    }

    #[test]
    fn plan_adds_callback_and_plan() {
        let mut context = Context::new();
        context.add_plan(1.0, |context| {
            context.get_data_mut(ComponentA).push(1);
            add_plan(context, 2.0, 3);
            context.queue_callback(|context| {
                context.get_data_mut(ComponentA).push(2);
            });
        });
        context.execute();
        assert_eq!(context.get_current_time(), 2.0);
        assert_eq!(*context.get_data_mut(ComponentA), vec![1, 2, 3]);
    }

    #[test]
    fn plans_at_same_time_run_in_insertion_order() {
        let mut context = Context::new();
        add_plan(&mut context, 1.0, 1);
        add_plan(&mut context, 1.0, 2);
        add_plan(&mut context, 1.0, 3);
        context.execute();
        assert_eq!(*context.get_data_mut(ComponentA), vec![1, 2, 3]);
    }

    #[test]
    #[should_panic(expected = "Invalid time value")]
    fn plan_cannot_be_added_in_the_past() {
        let mut context = Context::new();
        add_plan(&mut context, 2.0, 1);
        context.execute();
        add_plan(&mut context, 1.0, 2);
    }

    #[test]
    fn events_are_delivered_to_every_subscriber_in_order() {
        let mut context = Context::new();
        context.subscribe_to_event(|context, event: Ping| {
            context.get_data_mut(ComponentA).push(event.0);
        });
        context.subscribe_to_event(|context, event: Ping| {
            context.get_data_mut(ComponentA).push(event.0 * 10);
        });
        context.emit_event(Ping(1));
        context.emit_event(Ping(2));
        // Handlers are queued, not run inline.
        assert!(context.get_data(ComponentA).is_none());
        context.execute();
        assert_eq!(*context.get_data_mut(ComponentA), vec![1, 10, 2, 20]);
    }

    #[test]
    fn emit_without_subscribers_is_a_no_op() {
        let mut context = Context::new();
        context.emit_event(Ping(7));
        context.execute();
        assert!(context.get_data(ComponentA).is_none());
    }
}
