use caching_demo::error::Error;
use caching_demo::model::{BODY_FILLER, Content, QueryState, WorkUnit};

#[test]
fn validate_accepts_zero_size_and_duration() {
    assert!(WorkUnit::new(1, 0, 0).validate().is_ok());
}

#[test]
fn validate_rejects_negative_fields() {
    assert!(matches!(
        WorkUnit::new(3, -1, 10).validate(),
        Err(Error::InvalidWorkUnit { id: 3, .. })
    ));
    assert!(matches!(
        WorkUnit::new(4, 1, -1).validate(),
        Err(Error::InvalidWorkUnit { id: 4, .. })
    ));
}

#[test]
fn content_for_work_builds_title_and_body() {
    let content = Content::for_work(&WorkUnit::new(12, 4, 300));
    assert_eq!(content.title, "Title 12");
    assert_eq!(content.body, BODY_FILLER.to_string().repeat(4));
    assert_eq!(content.duration, 300);
}

#[test]
fn content_serializes_like_the_http_payload() {
    let content = Content::for_work(&WorkUnit::new(2, 3, 50));
    let json = serde_json::to_value(&content).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "id": 2,
            "size": 3,
            "duration": 50,
            "title": "Title 2",
            "body": "***",
        })
    );
}

#[test]
fn terminal_states_have_no_exits() {
    use QueryState::*;
    let all = [Submitted, Admitted, Running, Completed, TimedOut, Failed];
    for from in all.iter().copied().filter(|s| s.is_terminal()) {
        for to in all {
            assert!(!from.can_transition_to(to), "{from} -> {to}");
        }
    }
}

#[test]
fn lifecycle_transitions() {
    use QueryState::*;
    assert!(Submitted.can_transition_to(Admitted));
    assert!(Admitted.can_transition_to(Running));
    assert!(Admitted.can_transition_to(TimedOut));
    assert!(Running.can_transition_to(Completed));
    assert!(!Submitted.can_transition_to(Running));
    assert!(!Admitted.can_transition_to(Completed));
    assert_eq!(TimedOut.to_string(), "timed_out");
}
