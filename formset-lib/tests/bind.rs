//! Integration tests for binding groups to input sources.

use std::sync::Arc;

use formset_lib::bind::{
    EventKind, EventTarget, InputSource, Listener, ListenerId, MemorySource,
};
use formset_lib::error::BindError;
use formset_lib::{FormGroup, GroupConfig, constrain, group, group_with};

/// A source that cannot hold inputs.
struct PlainText;

impl InputSource for PlainText {
    fn is_container(&self) -> bool {
        false
    }

    fn add_listener(&self, _kind: EventKind, _listener: Listener) -> ListenerId {
        ListenerId(0)
    }

    fn remove_listener(&self, _id: ListenerId) {}

    fn inputs(&self) -> Vec<EventTarget> {
        Vec::new()
    }

    fn describe(&self) -> String {
        "plain text".to_string()
    }
}

fn login_form() -> FormGroup {
    group([
        ("username", constrain().required()),
        ("password", constrain().required().min_length(6)),
    ])
    .unwrap()
}

#[tokio::test]
async fn test_bind_listens_for_input_by_default() {
    let form = login_form();
    let source = MemorySource::new();

    form.bind(Arc::new(source.clone()), &[]).unwrap();

    assert_eq!(source.listener_count(EventKind::Input), 1);
    assert_eq!(source.listener_count(EventKind::Focus), 0);
    assert_eq!(source.listener_count(EventKind::Blur), 0);
}

#[tokio::test]
async fn test_bind_requested_events() {
    let form = login_form();
    let source = MemorySource::new();

    form.bind(Arc::new(source.clone()), &[EventKind::Input, EventKind::Blur])
        .unwrap();

    assert_eq!(source.listener_count(EventKind::Input), 1);
    assert_eq!(source.listener_count(EventKind::Blur), 1);
    assert_eq!(source.listener_count(EventKind::Focus), 0);
}

#[tokio::test]
async fn test_configured_default_events() {
    let form = group_with(
        [("name", constrain())],
        GroupConfig::default().with_default_events(vec![EventKind::Focus]),
    )
    .unwrap();
    let source = MemorySource::new();

    form.bind(Arc::new(source.clone()), &[]).unwrap();

    assert_eq!(source.listener_count(EventKind::Focus), 1);
    assert_eq!(source.listener_count(EventKind::Input), 0);
}

#[tokio::test]
async fn test_rebind_releases_previous_source() {
    let form = login_form();
    let first = MemorySource::new();
    let second = MemorySource::new();

    form.bind(Arc::new(first.clone()), &[EventKind::Input, EventKind::Focus])
        .unwrap();
    form.bind(Arc::new(second.clone()), &[]).unwrap();

    assert_eq!(first.listener_count(EventKind::Input), 0);
    assert_eq!(first.listener_count(EventKind::Focus), 0);
    assert_eq!(second.listener_count(EventKind::Input), 1);
}

#[tokio::test]
async fn test_bind_rejects_non_container() {
    let form = login_form();

    let result = form.bind(Arc::new(PlainText), &[]);

    assert!(matches!(result, Err(BindError::NotAContainer(ref what)) if what == "plain text"));
}

#[test]
fn test_bind_requires_runtime() {
    let form = login_form();

    let result = form.bind(Arc::new(MemorySource::new()), &[]);

    assert!(matches!(result, Err(BindError::NoRuntime)));
}

#[tokio::test]
async fn test_bind_collects_initial_values() {
    let form = login_form();
    assert!(form.invalid());

    let source = MemorySource::new();
    source.set_input(EventTarget::new("username").with_value("john"));
    source.set_input(EventTarget::new("password").with_value("password"));
    source.set_input(EventTarget::new("remember").with_value("on"));

    form.bind(Arc::new(source), &[]).unwrap();

    // Collection is deferred past the bind call.
    assert_eq!(form.get("username").unwrap().value(), None);

    form.settled().await;
    assert_eq!(form.get("username").unwrap().value(), Some("john"));
    assert!(form.valid());
    assert!(!form.values().contains_key("remember"));
}

#[tokio::test]
async fn test_source_events_validate_fields() {
    let form = login_form();
    let source = MemorySource::new();
    form.bind(Arc::new(source.clone()), &[]).unwrap();
    form.settled().await;

    source.emit(
        EventKind::Input,
        EventTarget::new("password").with_value("abc"),
    );
    form.settled().await;

    let password = form.get("password").unwrap();
    assert!(password.touched());
    assert_eq!(
        password.errors(),
        ["Password is too short (minimum is 6 characters)"]
    );
    assert!(!form.get("username").unwrap().touched());
}

#[tokio::test]
async fn test_unlistened_events_are_ignored() {
    let form = login_form();
    let source = MemorySource::new();
    form.bind(Arc::new(source.clone()), &[]).unwrap();
    form.settled().await;

    source.emit(EventKind::Blur, EventTarget::new("username").with_value("john"));
    form.settled().await;

    assert_eq!(form.get("username").unwrap().value(), None);
}

#[tokio::test]
async fn test_property_source_reads_override_from_properties() {
    let form = login_form();
    let source = MemorySource::with_property_attributes();
    form.bind(Arc::new(source.clone()), &[]).unwrap();
    form.settled().await;

    source.emit(
        EventKind::Input,
        EventTarget::new("login-name")
            .with_value("john")
            .with_property("validate-control", "username"),
    );
    form.settled().await;

    assert_eq!(form.get("username").unwrap().value(), Some("john"));
}

#[tokio::test]
async fn test_unbind_stops_validation() {
    let form = login_form();
    let source = MemorySource::new();
    form.bind(Arc::new(source.clone()), &[]).unwrap();
    form.settled().await;

    form.unbind();
    assert_eq!(source.listener_count(EventKind::Input), 0);

    source.emit(EventKind::Input, EventTarget::new("username").with_value("john"));
    form.settled().await;
    assert_eq!(form.get("username").unwrap().value(), None);
}

#[tokio::test]
async fn test_dropping_group_releases_source() {
    let source = MemorySource::new();
    {
        let form = login_form();
        form.bind(Arc::new(source.clone()), &[]).unwrap();
        form.settled().await;
    }

    assert_eq!(source.listener_count(EventKind::Input), 0);
}
