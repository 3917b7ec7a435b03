//! Request/response behaviour of the async session against a mock transport

mod common;

use common::*;

#[tokio::test]
async fn test_execute_returns_echo() {
    init_tracing();
    let mock = MockTransport::echo();
    let lac = Lac::with_timing(mock.clone(), fast_timing()).unwrap();

    let response = lac.execute(Command::SetAccuracy, 300).await.unwrap();

    assert_eq!(response.mode(), Command::SetAccuracy.opcode());
    assert_eq!(response.payload(), 300);
    assert_eq!(response.echoed_command(), Some(Command::SetAccuracy));
    assert_eq!(
        mock.events(),
        vec![
            Event::Write { opcode: 0x01, value: 300 },
            Event::Read { opcode: 0x01 }
        ]
    );
}

#[tokio::test]
async fn test_set_position_returns_feedback_not_echo() {
    let mock = MockTransport::with_default(Reply::Frame([0x20, 0x00, 0x02]));
    let lac = Lac::with_timing(mock.clone(), fast_timing()).unwrap();

    let response = lac.execute(Command::SetPosition, 500).await.unwrap();
    assert_eq!(response.payload(), 512);

    let position = lac.set_position(500).await.unwrap();
    assert_eq!(position, 512);
}

#[tokio::test]
async fn test_get_feedback_discards_mode() {
    let mock = MockTransport::with_default(Reply::Frame([0x42, 0x34, 0x01]));
    let lac = Lac::with_timing(mock.clone(), fast_timing()).unwrap();

    assert_eq!(lac.get_feedback().await.unwrap(), 0x0134);
    assert_eq!(mock.events()[0], Event::Write { opcode: 0x10, value: 0 });
}

#[tokio::test]
async fn test_engine_does_not_enforce_echo() {
    // The board answers with something else entirely; that's for the caller to judge
    let mock = MockTransport::with_default(Reply::Frame([0x0C, 0x07, 0x00]));
    let lac = Lac::with_timing(mock, fast_timing()).unwrap();

    let response = lac.set_proportional_gain(9).await.unwrap();
    assert_eq!(response.payload(), 7);

    let request = RequestFrame::new(Command::SetProportionalGain, 9).unwrap();
    assert!(matches!(
        response.verify_echo(&request),
        Err(LacError::EchoMismatch {
            sent_value: 9,
            payload: 7,
            ..
        })
    ));
}

#[tokio::test]
async fn test_typed_wrappers_send_their_opcode() {
    let mock = MockTransport::echo();
    let lac = Lac::with_timing(mock.clone(), fast_timing()).unwrap();

    lac.set_accuracy(4).await.unwrap();
    lac.set_retract_limit(20).await.unwrap();
    lac.set_extend_limit(1000).await.unwrap();
    lac.set_movement_threshold(3).await.unwrap();
    lac.set_stall_time(10).await.unwrap();
    lac.set_pwm_threshold(80).await.unwrap();
    lac.set_derivative_threshold(3).await.unwrap();
    lac.set_max_derivative(1023).await.unwrap();
    lac.set_min_derivative(0).await.unwrap();
    lac.set_max_pwm_value(1023).await.unwrap();
    lac.set_min_pwm_value(80).await.unwrap();
    lac.set_proportional_gain(1).await.unwrap();
    lac.set_derivative_gain(10).await.unwrap();
    lac.set_average_rc(4).await.unwrap();
    lac.set_average_adc(8).await.unwrap();
    lac.get_feedback().await.unwrap();
    lac.set_position(512).await.unwrap();
    lac.set_speed(700).await.unwrap();
    lac.disable_manual().await.unwrap();
    lac.reset().await.unwrap();

    let expected: Vec<u8> = Command::ALL.iter().map(|c| c.opcode()).collect();
    assert_eq!(mock.written_opcodes(), expected);
}

#[tokio::test]
async fn test_commands_without_argument_send_zero() {
    let mock = MockTransport::echo();
    let lac = Lac::with_timing(mock.clone(), fast_timing()).unwrap();

    lac.disable_manual().await.unwrap();
    lac.reset().await.unwrap();

    let events = mock.events();
    assert_eq!(events[0], Event::Write { opcode: 0x30, value: 0 });
    assert_eq!(events[2], Event::Write { opcode: 0xFF, value: 0 });
}

#[tokio::test]
async fn test_execute_raw_accepts_catalog_opcode() {
    let mock = MockTransport::echo();
    let lac = Lac::with_timing(mock.clone(), fast_timing()).unwrap();

    let response = lac.execute_raw(0x21, 1023).await.unwrap();
    assert_eq!(response.echoed_command(), Some(Command::SetSpeed));
    assert_eq!(response.payload(), 1023);
}

#[tokio::test]
async fn test_short_read_is_transport_error() {
    let mock = MockTransport::with_default(Reply::Raw(vec![0x10, 0x01]));
    let lac = Lac::with_timing(mock, fast_timing()).unwrap();

    let err = lac.get_feedback().await.unwrap_err();
    assert!(matches!(err, LacError::ShortRead { expected: 3, actual: 2 }));
    assert!(err.is_transport_failure());
    assert!(!err.is_timeout());
}

#[tokio::test]
async fn test_surplus_response_bytes_are_ignored() {
    init_tracing();
    let mock = MockTransport::with_default(Reply::Raw(vec![0x10, 0xFF, 0x00, 0xDE, 0xAD]));
    let lac = Lac::with_timing(mock, fast_timing()).unwrap();

    assert_eq!(lac.get_feedback().await.unwrap(), 255);
}

#[tokio::test]
async fn test_no_retry_after_timeout() {
    let mock = MockTransport::with_default(Reply::Timeout);
    let lac = Lac::with_timing(mock.clone(), fast_timing()).unwrap();

    let err = lac.set_speed(5).await.unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(mock.write_count(), 1);
}

#[tokio::test]
async fn test_write_timeout_skips_read() {
    let mock = MockTransport::echo();
    mock.fail_writes(1);
    let lac = Lac::with_timing(mock.clone(), fast_timing()).unwrap();

    let err = lac.set_accuracy(300).await.unwrap_err();
    assert!(err.is_timeout());
    assert!(matches!(
        err,
        LacError::Timeout {
            direction: Direction::HostToDevice
        }
    ));
    assert!(mock.events().is_empty(), "nothing may be read after a failed write");

    // The session stays usable
    let response = lac.execute(Command::SetAccuracy, 7).await.unwrap();
    assert_eq!(response.payload(), 7);
    assert_eq!(
        mock.events(),
        vec![
            Event::Write { opcode: 0x01, value: 7 },
            Event::Read { opcode: 0x01 }
        ]
    );
}

#[test]
fn test_blocking_write_timeout_skips_read() {
    let mock = MockTransport::echo();
    mock.fail_writes(1);
    let lac = BlockingLac::with_timing(mock.clone(), fast_timing()).unwrap();

    assert!(lac.set_position(100).unwrap_err().is_timeout());
    assert!(mock.events().is_empty());
    assert_eq!(lac.set_position(100).unwrap(), 100);
}

#[tokio::test]
async fn test_wait_for_position_reaches_target() {
    let mock = MockTransport::with_default(Reply::Frame([0x10, 0xF9, 0x01]));
    mock.push_replies([
        Reply::Frame([0x10, 0x64, 0x00]),
        Reply::Frame([0x10, 0x2C, 0x01]),
    ]);
    let lac = Lac::with_timing(mock.clone(), fast_timing()).unwrap();

    let position = lac
        .wait_for_position(500, 8, Duration::from_millis(1), Duration::from_secs(5))
        .await
        .unwrap();

    // 100, 300, then 505
    assert_eq!(position, 505);
    assert_eq!(mock.write_count(), 3);
}

#[tokio::test]
async fn test_wait_for_position_times_out() {
    let mock = MockTransport::with_default(Reply::Frame([0x10, 0x64, 0x00]));
    let lac = Lac::with_timing(mock, fast_timing()).unwrap();

    let err = lac
        .wait_for_position(500, 4, Duration::from_millis(5), Duration::from_millis(40))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LacError::PositionTimeout {
            target: 500,
            last: Some(100)
        }
    ));
}

#[tokio::test]
async fn test_wait_for_position_propagates_transport_errors() {
    let mock = MockTransport::with_default(Reply::Timeout);
    let lac = Lac::with_timing(mock, fast_timing()).unwrap();

    let err = lac
        .wait_for_position(500, 4, Duration::from_millis(1), Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(err.is_timeout());
}
