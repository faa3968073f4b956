//! The `Context` is the record that every part of a simulation run is wired through.
//!
//! It holds three things:
//! * Type-keyed data containers ("data plugins") that modules use to keep their own state,
//!   declared with [`define_data_plugin!`].
//! * A queue of callbacks that run in FIFO order when [`Context::execute_callbacks`] is called.
//! * Typed event subscriptions. Emitting an event queues one callback per subscriber, so
//!   handlers observe events in the order they were emitted and in subscription order.
//!
//! A `Context` is built once per simulation, when the decision process is created, and is
//! dropped when the simulation is cleared. Nothing in the crate is a process-wide singleton
//! except the logger.
use std::any::{Any, TypeId};
use std::collections::VecDeque;
use std::rc::Rc;

use log::trace;

use crate::HashMap;

pub trait DataPlugin: Any {
    type DataContainer;

    fn create_data_container() -> Self::DataContainer;
}

#[macro_export]
macro_rules! define_data_plugin {
    ($plugin:ident, $data_container:ty, $default: expr) => {
        #[derive(Copy, Clone)]
        struct $plugin;

        impl $crate::context::DataPlugin for $plugin {
            type DataContainer = $data_container;

            fn create_data_container() -> Self::DataContainer {
                $default
            }
        }
    };
}
pub use define_data_plugin;

/// Marker for values that can be passed to [`Context::emit_event`].
pub trait Event: Copy + 'static {}

type Callback = dyn FnOnce(&mut Context);
type EventHandler<E> = dyn Fn(&mut Context, E);

pub struct Context {
    callback_queue: VecDeque<Box<Callback>>,
    data_plugins: HashMap<TypeId, Box<dyn Any>>,
    // Values are `Vec<Rc<EventHandler<E>>>`, keyed by the `TypeId` of `E`.
    event_handlers: HashMap<TypeId, Box<dyn Any>>,
}

impl Context {
    #[must_use]
    pub fn new() -> Context {
        Context {
            callback_queue: VecDeque::new(),
            data_plugins: HashMap::default(),
            event_handlers: HashMap::default(),
        }
    }

    /// Queues a callback to be run by the next call to `execute_callbacks`.
    pub fn queue_callback(&mut self, callback: impl FnOnce(&mut Context) + 'static) {
        self.callback_queue.push_back(Box::new(callback));
    }

    /// Runs queued callbacks until the queue is empty. Callbacks queued while draining are
    /// run in the same call.
    pub fn execute_callbacks(&mut self) {
        while let Some(callback) = self.callback_queue.pop_front() {
            callback(self);
        }
    }

    /// Registers `handler` to be called with every event of type `E` emitted from now on.
    pub fn subscribe_to_event<E: Event>(&mut self, handler: impl Fn(&mut Context, E) + 'static) {
        let handlers = self
            .event_handlers
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(Vec::<Rc<EventHandler<E>>>::new()) as Box<dyn Any>)
            .downcast_mut::<Vec<Rc<EventHandler<E>>>>()
            .unwrap(); // Will never panic as the entry is keyed by the handler type
        handlers.push(Rc::new(handler));
    }

    /// Queues a call to every handler subscribed to `E`. Handlers run on the next call to
    /// `execute_callbacks`.
    pub fn emit_event<E: Event>(&mut self, event: E) {
        let Some(handlers) = self
            .event_handlers
            .get(&TypeId::of::<E>())
            .and_then(|handlers| handlers.downcast_ref::<Vec<Rc<EventHandler<E>>>>())
        else {
            return;
        };
        let handlers: Vec<Rc<EventHandler<E>>> = handlers.clone();
        trace!(
            "emitting {} to {} handlers",
            std::any::type_name::<E>(),
            handlers.len()
        );
        for handler in handlers {
            self.queue_callback(move |context| handler(context, event));
        }
    }

    fn add_plugin<T: DataPlugin>(&mut self) {
        self.data_plugins
            .insert(TypeId::of::<T>(), Box::new(T::create_data_container()));
    }

    /// Returns a mutable reference to the data container for `T`, creating it if it doesn't
    /// exist yet.
    pub fn get_data_container_mut<T: DataPlugin>(&mut self, _plugin: T) -> &mut T::DataContainer {
        let type_id = TypeId::of::<T>();
        if !self.data_plugins.contains_key(&type_id) {
            self.add_plugin::<T>();
        }
        self.data_plugins
            .get_mut(&type_id)
            .unwrap() // Inserted above
            .downcast_mut::<T::DataContainer>()
            .unwrap() // Will never panic as the data container has the matching type
    }

    /// Returns a reference to the data container for `T` if it exists.
    pub fn get_data_container<T: DataPlugin>(&self, _plugin: T) -> Option<&T::DataContainer> {
        self.data_plugins
            .get(&TypeId::of::<T>())
            .and_then(|data| data.downcast_ref::<T::DataContainer>())
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
