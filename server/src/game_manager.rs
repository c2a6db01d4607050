//! Registry of every game hosted by the server
//!
//! Each game sits behind its own mutex. Order submission and turn resolution
//! both lock the game they touch, so the two can never interleave for the same
//! game while different games proceed independently.

use crate::error::{GameError, Result};
use crate::game::{Game, GameStatus};
use crate::GameRules;
use log::info;
use shared::{Catalog, GameId, PlayerId, RaceId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type SharedGame = Arc<Mutex<Game>>;

/// Registry of every game hosted by the server, keyed by id
pub struct GameManager {
    games: HashMap<GameId, SharedGame>,
    next_game_id: u32,
    catalog: Arc<Catalog>,
    rules: GameRules,
}

impl GameManager {
    pub fn new(catalog: Arc<Catalog>, rules: GameRules) -> Self {
        Self {
            games: HashMap::new(),
            next_game_id: 1,
            catalog,
            rules,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Opens a new game in the waiting state
    pub fn create_game(&mut self) -> (GameId, SharedGame) {
        let id = GameId(self.next_game_id);
        self.next_game_id += 1;

        let game = Arc::new(Mutex::new(Game::new(id, Arc::clone(&self.catalog), self.rules.clone())));
        self.games.insert(id, Arc::clone(&game));
        info!("Created game {}", id);
        (id, game)
    }

    pub fn get(&self, id: GameId) -> Result<SharedGame> {
        self.games
            .get(&id)
            .cloned()
            .ok_or(GameError::UnknownGame(id))
    }

    /// Seats a player in the newest waiting game with room, opening one if needed
    pub async fn join(&mut self, player: PlayerId, name: &str, race: RaceId) -> Result<GameId> {
        if self.catalog.race(race).is_none() {
            return Err(GameError::UnknownRace(race));
        }

        let mut ids: Vec<GameId> = self.games.keys().copied().collect();
        ids.sort_unstable_by(|a, b| b.cmp(a));

        for id in ids {
            let Some(handle) = self.games.get(&id) else {
                continue;
            };
            let mut game = handle.lock().await;
            if game.status() == GameStatus::Waiting && game.has_room() {
                game.add_player(player, name, race)?;
                return Ok(id);
            }
        }

        let (id, handle) = self.create_game();
        handle.lock().await.add_player(player, name, race)?;
        Ok(id)
    }

    /// Handles to every game, in id order
    pub fn games(&self) -> Vec<(GameId, SharedGame)> {
        let mut games: Vec<(GameId, SharedGame)> = self
            .games
            .iter()
            .map(|(id, game)| (*id, Arc::clone(game)))
            .collect();
        games.sort_unstable_by_key(|(id, _)| *id);
        games
    }

    /// Drops games that have ended, returning their ids
    pub async fn prune_ended(&mut self) -> Vec<GameId> {
        let mut ended = Vec::new();
        for (id, game) in &self.games {
            if game.lock().await.status() == GameStatus::Ended {
                ended.push(*id);
            }
        }

        for id in &ended {
            self.games.remove(id);
            info!("Removed finished game {}", id);
        }
        ended
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> GameManager {
        GameManager::new(Arc::new(Catalog::standard()), GameRules::default())
    }

    #[test]
    fn test_manager_creation() {
        let manager = manager();
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_create_game_assigns_increasing_ids() {
        let mut manager = manager();
        let (first, _) = manager.create_game();
        let (second, _) = manager.create_game();

        assert_eq!(first, GameId(1));
        assert_eq!(second, GameId(2));
        assert_eq!(manager.len(), 2);
        assert!(manager.get(first).is_ok());
        assert_eq!(
            manager.get(GameId(9)).err(),
            Some(GameError::UnknownGame(GameId(9)))
        );
    }

    #[tokio::test]
    async fn test_join_fills_waiting_game() {
        let mut manager = manager();

        let a = manager.join(PlayerId(1), "a", RaceId(0)).await.unwrap();
        let b = manager.join(PlayerId(2), "b", RaceId(1)).await.unwrap();

        assert_eq!(a, b);
        assert_eq!(manager.len(), 1);
        let game = manager.get(a).unwrap();
        assert_eq!(game.lock().await.player_count(), 2);
    }

    #[tokio::test]
    async fn test_join_opens_new_game_once_started() {
        let mut manager = manager();
        let first = manager.join(PlayerId(1), "a", RaceId(0)).await.unwrap();
        manager.join(PlayerId(2), "b", RaceId(0)).await.unwrap();
        manager.get(first).unwrap().lock().await.start().unwrap();

        let second = manager.join(PlayerId(3), "c", RaceId(0)).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_join_rejects_unknown_race() {
        let mut manager = manager();
        let result = tokio_test::block_on(manager.join(PlayerId(1), "a", RaceId(77)));
        assert_eq!(result, Err(GameError::UnknownRace(RaceId(77))));
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn test_prune_ended_games() {
        let mut manager = manager();
        let (done, game) = manager.create_game();
        let (open, _) = manager.create_game();
        {
            let mut game = game.lock().await;
            game.add_player(PlayerId(1), "a", RaceId(0)).unwrap();
            game.add_player(PlayerId(2), "b", RaceId(0)).unwrap();
            game.start().unwrap();
            game.end().unwrap();
        }

        let removed = manager.prune_ended().await;
        assert_eq!(removed, vec![done]);
        assert!(manager.get(open).is_ok());
        assert_eq!(manager.len(), 1);
    }
}
