use pretty_assertions::assert_eq;
use serde_json::json;
use trial::message::{Message, Outcome, RunEvent, TestEvent, WorkerLine};
use trial::ProtocolError;

fn as_json(message: &Message) -> serde_json::Value {
    serde_json::from_str(&message.to_line().unwrap()).unwrap()
}

#[test]
fn passing_test_event_has_no_error_fields() {
    let message = Message::Test(TestEvent {
        context: "math".into(),
        name: "adds".into(),
        duration: 3,
        outcome: Outcome::Passed,
    });
    assert_eq!(
        as_json(&message),
        json!({"final": false, "success": true, "context": "math", "name": "adds", "duration": 3})
    );
}

#[test]
fn failing_test_event_carries_error_and_stack() {
    let message = Message::Test(TestEvent {
        context: "math".into(),
        name: "divides".into(),
        duration: 0,
        outcome: Outcome::Failed {
            error: "1 is not equal to 2".into(),
            stack: "Error: 1 is not equal to 2".into(),
        },
    });
    let wire = as_json(&message);
    assert_eq!(wire["success"], json!(false));
    assert_eq!(wire["error"], json!("1 is not equal to 2"));
    assert_eq!(Message::parse(&message.to_line().unwrap()).unwrap(), message);
}

#[test]
fn final_event_wire_form() {
    let message = Message::Final(RunEvent {
        context: "math".into(),
        success: false,
        passed: 4,
        rejected: 1,
        duration: 12,
    });
    assert_eq!(
        as_json(&message),
        json!({"final": true, "success": false, "context": "math", "passed": 4, "rejected": 1, "duration": 12})
    );
}

#[test]
fn parse_tolerates_surrounding_whitespace() {
    let line = "  {\"final\":true,\"success\":true,\"context\":\"c\",\"passed\":1,\"rejected\":0,\"duration\":2}\r";
    assert!(matches!(Message::parse(line), Ok(Message::Final(_))));
}

#[test]
fn final_without_counts_is_rejected() {
    let err = Message::parse(r#"{"final":true,"success":true,"context":"c","duration":0}"#)
        .unwrap_err();
    assert!(err.to_string().contains("passed"));
}

#[test]
fn non_protocol_lines_fail_to_parse() {
    assert!(matches!(
        Message::parse("hello from println"),
        Err(ProtocolError::Json(_))
    ));
}

#[test]
fn message_glued_to_unterminated_output_is_recovered() {
    let line = r#"progress...{"final":true,"success":true,"context":"math","passed":2,"rejected":0,"duration":3}"#;
    let (text, message) = Message::extract(line);
    assert_eq!(text, "progress...");
    assert_eq!(
        message,
        Some(Message::Final(RunEvent {
            context: "math".into(),
            success: true,
            passed: 2,
            rejected: 0,
            duration: 3,
        }))
    );
}

#[test]
fn worker_line_keeps_text_before_the_message() {
    let line = r#"loading {"final":false,"success":true,"context":"math","name":"adds","duration":0}"#;
    let pieces = WorkerLine::split(line);
    assert_eq!(pieces.len(), 2);
    assert_eq!(pieces[0], WorkerLine::Text("loading ".into()));
    assert!(matches!(&pieces[1], WorkerLine::Message(Message::Test(event)) if event.name == "adds"));
}

#[test]
fn plain_text_and_blank_lines() {
    assert_eq!(
        WorkerLine::split("just some output"),
        vec![WorkerLine::Text("just some output".into())]
    );
    assert!(WorkerLine::split("   ").is_empty());
}
