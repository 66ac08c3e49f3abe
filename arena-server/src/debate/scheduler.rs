//! Turn order.

use super::{DebateSession, PersonaId};

/// Who may speak next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    Speak(PersonaId),
    Finished,
}

/// Decide the next turn from a session snapshot.
///
/// ai1 always opens; after that the personas strictly alternate until the
/// session is stopped or the round ceiling is reached.
pub fn next_turn(session: &DebateSession) -> Turn {
    if session.active && session.transcript.is_empty() {
        return Turn::Speak(PersonaId::Ai1);
    }
    if session.is_finished() {
        return Turn::Finished;
    }
    match session.last_speaker() {
        Some(last) => Turn::Speak(last.opponent()),
        None => Turn::Speak(PersonaId::Ai1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opening_turn_is_ai1() {
        let session = DebateSession::new("cats vs dogs", 3);
        assert_eq!(next_turn(&session), Turn::Speak(PersonaId::Ai1));
    }

    #[test]
    fn test_single_round_still_serves_opening() {
        let session = DebateSession::new("cats vs dogs", 1);
        assert_eq!(next_turn(&session), Turn::Speak(PersonaId::Ai1));
    }

    #[test]
    fn test_strict_alternation() {
        let mut session = DebateSession::new("cats vs dogs", 10);
        let mut order = Vec::new();
        for i in 0..6 {
            let Turn::Speak(persona) = next_turn(&session) else {
                panic!("debate finished early");
            };
            order.push(persona);
            session.record_turn(persona, format!("turn {i}"));
        }
        assert_eq!(
            order,
            vec![
                PersonaId::Ai1,
                PersonaId::Ai2,
                PersonaId::Ai1,
                PersonaId::Ai2,
                PersonaId::Ai1,
                PersonaId::Ai2
            ]
        );
    }

    #[test]
    fn test_finished_at_ceiling() {
        let mut session = DebateSession::new("cats vs dogs", 2);
        session.record_turn(PersonaId::Ai1, "a");
        session.record_turn(PersonaId::Ai2, "b");
        assert_eq!(next_turn(&session), Turn::Finished);
    }

    #[test]
    fn test_finished_after_stop() {
        let mut session = DebateSession::new("cats vs dogs", 5);
        session.stop();
        assert_eq!(next_turn(&session), Turn::Finished);

        let mut session = DebateSession::new("cats vs dogs", 5);
        session.record_turn(PersonaId::Ai1, "a");
        session.stop();
        assert_eq!(next_turn(&session), Turn::Finished);
    }
}
