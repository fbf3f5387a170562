//! Lifecycle event handlers.
//!
//! Handlers observe a run; they do not steer it. An error raised by a
//! handler is a framework fault that aborts the run, so a misbehaving
//! observer cannot silently corrupt reporting.

use crate::{ScenaristError, ScenaristResult, TestError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioEvent {
    BeforeScenario,
    AfterScenario,
    BeforeStep,
    AfterStep,
    Error,
}

impl std::fmt::Display for ScenarioEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ScenarioEvent::BeforeScenario => "before-scenario",
            ScenarioEvent::AfterScenario => "after-scenario",
            ScenarioEvent::BeforeStep => "before-step",
            ScenarioEvent::AfterStep => "after-step",
            ScenarioEvent::Error => "error",
        })
    }
}

/// What a handler sees when it fires.
#[derive(Debug, Clone, Copy)]
pub struct EventInfo<'a> {
    pub event: ScenarioEvent,
    pub scenario: &'a str,
    pub step: Option<&'a str>,
    pub error: Option<&'a TestError>,
}

pub type HandlerFn = Box<dyn FnMut(&EventInfo<'_>) -> Result<(), String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

struct Entry {
    id: HandlerId,
    event: ScenarioEvent,
    once: bool,
    handler: HandlerFn,
}

/// Per-run handler registry, owned by the run context. Handlers fire
/// synchronously in install order.
#[derive(Default)]
pub struct HandlerRegistry {
    entries: Vec<Entry>,
    next_id: u64,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(
        &mut self,
        event: ScenarioEvent,
        once: bool,
        handler: impl FnMut(&EventInfo<'_>) -> Result<(), String> + 'static,
    ) -> HandlerId {
        self.next_id += 1;
        let id = HandlerId(self.next_id);
        self.entries.push(Entry {
            id,
            event,
            once,
            handler: Box::new(handler),
        });
        id
    }

    pub fn uninstall(&mut self, id: HandlerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    /// Fire all handlers installed for `event`.
    ///
    /// One-shot handlers are removed after firing, including when a later
    /// handler errors out. The first handler error aborts the dispatch.
    pub fn fire(&mut self, info: &EventInfo<'_>) -> ScenaristResult<()> {
        let mut spent = Vec::new();
        let mut failed = None;
        for entry in &mut self.entries {
            if entry.event != info.event {
                continue;
            }
            let outcome = (entry.handler)(info);
            if entry.once {
                spent.push(entry.id);
            }
            if let Err(message) = outcome {
                failed = Some(ScenaristError::Handler {
                    event: info.event.to_string(),
                    message,
                });
                break;
            }
        }
        self.entries.retain(|e| !spent.contains(&e.id));
        match failed {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn info(event: ScenarioEvent) -> EventInfo<'static> {
        EventInfo {
            event,
            scenario: "demo",
            step: None,
            error: None,
        }
    }

    #[test]
    fn handlers_fire_in_install_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut reg = HandlerRegistry::new();
        for tag in ["first", "second"] {
            let seen = Rc::clone(&seen);
            reg.install(ScenarioEvent::BeforeStep, false, move |_| {
                seen.borrow_mut().push(tag);
                Ok(())
            });
        }
        reg.fire(&info(ScenarioEvent::BeforeStep)).unwrap();
        assert_eq!(*seen.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn once_handlers_fire_a_single_time() {
        let count = Rc::new(RefCell::new(0u32));
        let mut reg = HandlerRegistry::new();
        let c = Rc::clone(&count);
        reg.install(ScenarioEvent::AfterStep, true, move |_| {
            *c.borrow_mut() += 1;
            Ok(())
        });
        reg.fire(&info(ScenarioEvent::AfterStep)).unwrap();
        reg.fire(&info(ScenarioEvent::AfterStep)).unwrap();
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn handler_errors_propagate() {
        let mut reg = HandlerRegistry::new();
        reg.install(ScenarioEvent::Error, false, |_| Err("observer broke".to_string()));
        let err = reg.fire(&info(ScenarioEvent::Error)).unwrap_err();
        match err {
            ScenaristError::Handler { event, message } => {
                assert_eq!(event, "error");
                assert_eq!(message, "observer broke");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn uninstall_removes_the_handler() {
        let count = Rc::new(RefCell::new(0u32));
        let mut reg = HandlerRegistry::new();
        let c = Rc::clone(&count);
        let id = reg.install(ScenarioEvent::BeforeScenario, false, move |_| {
            *c.borrow_mut() += 1;
            Ok(())
        });
        assert!(reg.uninstall(id));
        assert!(!reg.uninstall(id));
        reg.fire(&info(ScenarioEvent::BeforeScenario)).unwrap();
        assert_eq!(*count.borrow(), 0);
    }
}
