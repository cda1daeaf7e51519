//! Unit tests for session lifecycle states

use breakwatch::core::session::SessionState;
use breakwatch::error::{SessionError, TransportError};

#[test]
fn test_terminal_states() {
    assert!(!SessionState::Created.is_terminal());
    assert!(!SessionState::Backfilling.is_terminal());
    assert!(!SessionState::Connecting.is_terminal());
    assert!(!SessionState::Streaming.is_terminal());
    assert!(SessionState::Closed.is_terminal());
    assert!(SessionState::Failed(SessionError::Aborted).is_terminal());
}

#[test]
fn test_failed_state_display_includes_reason() {
    let state = SessionState::Failed(SessionError::Transport(TransportError::Read(
        "connection reset".to_string(),
    )));
    assert_eq!(state.name(), "failed");
    assert_eq!(
        state.to_string(),
        "failed: transport failed: feed read failed: connection reset"
    );
    assert!(state.failure().is_some());
    assert_eq!(SessionState::Streaming.to_string(), "streaming");
    assert!(SessionState::Closed.failure().is_none());
}
