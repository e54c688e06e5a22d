//! Dependent scripts that export a table.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::{
    CompiledScript, PreludeScript, ScriptBase, ScriptKind, ScriptState, derive_template,
    first_value,
};
use crate::api::{ErrorKind, Failure};
use crate::engine::{EngineInstance, MultiValue, Table, Template, Value};

/// A module compiled against its prelude's template. A successful run must
/// produce a table, kept as the module's exports.
pub struct ModuleScript {
    prelude: Weak<PreludeScript>,
    exports: RefCell<Option<Table>>,
    base: ScriptBase,
}

impl ModuleScript {
    pub fn new(prelude: &Rc<PreludeScript>) -> Rc<Self> {
        let parent = prelude.base();
        Rc::new(Self {
            prelude: Rc::downgrade(prelude),
            exports: RefCell::new(None),
            base: ScriptBase::new(
                ScriptKind::Module,
                EngineInstance::acquire(parent.instance()),
                parent.cancellation().clone(),
            ),
        })
    }

    /// The table produced by the last successful run.
    pub fn exports(&self) -> Option<Table> {
        self.exports.borrow().clone()
    }
}

impl CompiledScript for ModuleScript {
    fn base(&self) -> &ScriptBase {
        &self.base
    }

    fn build_template(&self) -> Result<Template, Failure> {
        // Loaded from inside the prelude's own code: no factory to ask yet.
        if self.prelude.upgrade().is_some_and(|p| p.is_bootstrapping()) {
            return Ok(Template::new());
        }
        derive_template(&self.base, &self.prelude, MultiValue::new())
    }

    fn run(&self) -> Result<(), Failure> {
        match first_value(self.base.run_compiled()?) {
            Value::Table(exports) => {
                *self.exports.borrow_mut() = Some(exports);
                self.base.set_state(ScriptState::Ran);
                Ok(())
            }
            _ => Err(self
                .base
                .fault(ErrorKind::Runtime, "module script must return an object")),
        }
    }

    fn discard_results(&self) {
        self.exports.borrow_mut().take();
    }
}
