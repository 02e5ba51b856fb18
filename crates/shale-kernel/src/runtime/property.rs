//! Property cells: builtin-only mutable values that run a change
//! callback on every write.
//!
//! Properties mirror interpreter state into the host environment — the
//! `env` namespace uses them for the working directory and PATH. They
//! are the one value kind shared by reference: every binding holding
//! the cell observes every write.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::runtime::value::Value;

pub type WriteHook = Box<dyn FnMut(&Value)>;

pub struct Property {
    name: String,
    value: Value,
    on_write: Option<WriteHook>,
}

impl Property {
    /// Create a shared property cell with an optional write hook.
    pub fn cell(
        name: impl Into<String>,
        initial: Value,
        on_write: Option<WriteHook>,
    ) -> Rc<RefCell<Property>> {
        Rc::new(RefCell::new(Property { name: name.into(), value: initial, on_write }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current content of the cell.
    pub fn get(&self) -> Value {
        self.value.clone()
    }

    /// Write the cell and run the change callback.
    pub fn set(&mut self, value: Value) {
        self.value = value;
        if let Some(hook) = &mut self.on_write {
            hook(&self.value);
        }
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("hooked", &self.on_write.is_some())
            .finish()
    }
}
