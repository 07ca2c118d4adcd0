use std::cell::RefCell;
use std::rc::Rc;

use partview_core::{Event, EventBus, EventFilter, EventPayload, EventType, ViewerError};

fn custom(name: &str) -> EventType {
    EventType::Custom(name.to_string())
}

fn custom_event(name: &str) -> Event {
    Event::new(custom(name), 0, EventPayload::None)
}

#[test]
fn test_type_handlers_run_before_wildcard_in_registration_order() {
    let mut bus = EventBus::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    let o = Rc::clone(&order);
    bus.subscribe(EventType::ViewReset, move |_, _| {
        o.borrow_mut().push("typed-1");
        Ok(())
    });
    let o = Rc::clone(&order);
    bus.subscribe_all(move |_, _| {
        o.borrow_mut().push("wildcard");
        Ok(())
    });
    let o = Rc::clone(&order);
    bus.subscribe(EventType::ViewReset, move |_, _| {
        o.borrow_mut().push("typed-2");
        Ok(())
    });

    bus.publish(Event::view_reset(false, 0));
    assert_eq!(
        order.borrow().as_slice(),
        &["typed-1", "typed-2", "wildcard"]
    );
}

#[test]
fn test_unsubscribe_is_idempotent() {
    let mut bus = EventBus::new();
    let count = Rc::new(RefCell::new(0usize));

    let c = Rc::clone(&count);
    let id = bus.subscribe(EventType::ViewReset, move |_, _| {
        *c.borrow_mut() += 1;
        Ok(())
    });

    bus.publish(Event::view_reset(false, 0));
    assert_eq!(*count.borrow(), 1);

    assert!(bus.unsubscribe(id));
    assert!(!bus.unsubscribe(id));
    assert!(!bus.unsubscribe(id));

    bus.publish(Event::view_reset(false, 0));
    assert_eq!(*count.borrow(), 1);
}

#[test]
fn test_failing_handler_does_not_block_later_subscribers() {
    let mut bus = EventBus::new();
    let seen = Rc::new(RefCell::new(0usize));
    let errors = Rc::new(RefCell::new(Vec::new()));

    bus.subscribe(EventType::SectionFocus, |_, _| {
        Err(ViewerError::new("handler exploded"))
    });
    let s = Rc::clone(&seen);
    bus.subscribe(EventType::SectionFocus, move |_, _| {
        *s.borrow_mut() += 1;
        Ok(())
    });
    let e = Rc::clone(&errors);
    bus.subscribe(EventType::Error, move |event, _| {
        e.borrow_mut().push(event.payload.clone());
        Ok(())
    });

    bus.publish(Event::section_focus("gear", 0));

    // The second subscriber still received the original event.
    assert_eq!(*seen.borrow(), 1);
    // Exactly one Error event, tagged with the originating type.
    let errors = errors.borrow();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        EventPayload::Error {
            original_event_type,
            ..
        } => assert_eq!(original_event_type, &Some(EventType::SectionFocus)),
        other => panic!("unexpected payload {other:?}"),
    }
}

#[test]
fn test_failing_error_handler_is_not_republished() {
    let mut bus = EventBus::new();
    let error_events = Rc::new(RefCell::new(0usize));

    bus.subscribe(EventType::Error, |_, _| {
        Err(ViewerError::new("error handler itself fails"))
    });
    let c = Rc::clone(&error_events);
    bus.subscribe_all(move |event, _| {
        if event.event_type == EventType::Error {
            *c.borrow_mut() += 1;
        }
        Ok(())
    });

    bus.publish(Event::error("boom", None, 0));
    assert_eq!(*error_events.borrow(), 1);
}

#[test]
fn test_reentrant_publish_is_breadth_first() {
    let mut bus = EventBus::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    bus.subscribe(custom("a"), |_, sink| {
        sink.publish(custom_event("b"));
        sink.publish(custom_event("c"));
        Ok(())
    });
    bus.subscribe(custom("b"), |_, sink| {
        sink.publish(custom_event("d"));
        Ok(())
    });
    let o = Rc::clone(&order);
    bus.subscribe_all(move |event, _| {
        o.borrow_mut().push(event.event_type.name().to_string());
        Ok(())
    });

    bus.publish(custom_event("a"));
    // b and c (queued by a) run before d (queued by b).
    assert_eq!(order.borrow().as_slice(), &["a", "b", "c", "d"]);
}

#[test]
fn test_clear_removes_subscriptions_but_keeps_history() {
    let mut bus = EventBus::with_history(Some(10));
    bus.subscribe(EventType::ViewReset, |_, _| Ok(()));
    bus.publish(Event::view_reset(true, 5));

    bus.clear();
    assert_eq!(bus.subscription_count(), 0);
    assert_eq!(bus.history_len(), 1);

    let recent = bus.recent(&EventFilter {
        event_type: Some(EventType::ViewReset),
        ..Default::default()
    });
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].timestamp_ms, 5);
}
