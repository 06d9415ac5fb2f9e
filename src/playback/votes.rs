use parking_lot::Mutex;
use std::collections::HashSet;
use tracing::debug;

use crate::error::PlaybackError;
use crate::ids::UserId;

/// Votos para saltar el track actual de una sala.
///
/// El conjunto vive exactamente lo que vive el track actual: el scheduler
/// lo limpia en cada cambio de track, sea por fin natural, por voto o por
/// parada administrativa.
#[derive(Debug, Default)]
pub struct VoteTracker {
    voters: Mutex<HashSet<UserId>>,
}

impl VoteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra un voto; cada usuario cuenta una sola vez
    pub fn register(&self, voter: UserId) -> Result<usize, PlaybackError> {
        let mut voters = self.voters.lock();
        if !voters.insert(voter) {
            return Err(PlaybackError::AlreadyVoted);
        }
        debug!("🗳️ Voto de {} registrado ({} en total)", voter, voters.len());
        Ok(voters.len())
    }

    /// Limpia todos los votos; se llama una vez por transición de track
    pub fn reset(&self) {
        self.voters.lock().clear();
    }

    pub fn count(&self) -> usize {
        self.voters.lock().len()
    }

    /// Votos necesarios para saltar: un tercio (34%) de los oyentes,
    /// excluyendo la presencia del propio bot, redondeando hacia arriba.
    /// Aritmética entera para que los umbrales exactos no dependan de
    /// redondeo flotante.
    pub fn required_votes(eligible_listeners: usize) -> usize {
        let others = eligible_listeners.saturating_sub(1);
        (34 * others).div_ceil(100)
    }

    pub fn has_threshold(&self, eligible_listeners: usize) -> bool {
        self.count() >= Self::required_votes(eligible_listeners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn one_third_of_listeners_excluding_the_bot() {
        // 4 oyentes: ceil(0.34 * 3) = 2
        assert_eq!(VoteTracker::required_votes(4), 2);
        assert_eq!(VoteTracker::required_votes(2), 1);
    }

    #[test]
    fn empty_room_requires_zero_votes() {
        // solo la presencia del bot
        assert_eq!(VoteTracker::required_votes(1), 0);
        assert_eq!(VoteTracker::required_votes(0), 0);
    }

    #[test]
    fn exact_thresholds_round_up() {
        // 51 oyentes: 34% de 50 es exactamente 17
        assert_eq!(VoteTracker::required_votes(51), 17);
        // 26 oyentes: 34% de 25 es 8.5, sube a 9
        assert_eq!(VoteTracker::required_votes(26), 9);
    }

    #[test]
    fn duplicate_votes_do_not_count() {
        let votes = VoteTracker::new();
        assert_eq!(votes.register(UserId(1)).unwrap(), 1);
        assert!(matches!(
            votes.register(UserId(1)),
            Err(PlaybackError::AlreadyVoted)
        ));
        assert_eq!(votes.count(), 1);
    }

    #[test]
    fn threshold_reached_with_distinct_votes() {
        let votes = VoteTracker::new();
        votes.register(UserId(1)).unwrap();
        assert!(!votes.has_threshold(4));
        votes.register(UserId(2)).unwrap();
        assert!(votes.has_threshold(4));
    }

    #[test]
    fn single_vote_skips_in_empty_room() {
        let votes = VoteTracker::new();
        votes.register(UserId(9)).unwrap();
        assert!(votes.has_threshold(1));
    }

    #[test]
    fn reset_clears_votes() {
        let votes = VoteTracker::new();
        votes.register(UserId(1)).unwrap();
        votes.register(UserId(2)).unwrap();
        votes.reset();
        assert_eq!(votes.count(), 0);
        // tras el reset el mismo usuario puede volver a votar
        assert_eq!(votes.register(UserId(1)).unwrap(), 1);
    }
}
