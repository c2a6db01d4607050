//! Authoritative game state and turn resolution
//!
//! A [`Game`] owns its players and moves through three states: players join
//! while it is `Waiting`, orders are accepted and turns resolved while it is
//! `Running`, and nothing changes once it has `Ended`.
//!
//! Each turn runs in two phases. First every player collects production and
//! executes their pending orders, with attack orders only registering with the
//! turn's [`AttackContext`]. Then every attacked player is resolved once
//! against all of its attackers. Because unit availability is snapshotted
//! before the first phase, no player's result depends on the order in which
//! other players' orders ran.

use crate::combat::{resolve_defender, AttackContext};
use crate::error::{GameError, Result};
use crate::orders::{execute_orders, validate_batch};
use crate::GameRules;
use log::{debug, info, warn};
use shared::{Catalog, GameId, Order, Player, PlayerId, RaceId, TurnReport};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Waiting,
    Running,
    Ended,
}

#[derive(Debug, Clone)]
pub struct Game {
    pub id: GameId,
    status: GameStatus,
    turn: u32,
    /// Milliseconds since the Unix epoch when the last turn resolved
    last_turn_at: Option<u64>,
    players: BTreeMap<PlayerId, Player>,
    catalog: Arc<Catalog>,
    rules: GameRules,
}

impl Game {
    pub fn new(id: GameId, catalog: Arc<Catalog>, rules: GameRules) -> Self {
        Self {
            id,
            status: GameStatus::Waiting,
            turn: 0,
            last_turn_at: None,
            players: BTreeMap::new(),
            catalog,
            rules,
        }
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    /// Number of the next turn to be resolved
    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn last_turn_at(&self) -> Option<u64> {
        self.last_turn_at
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn has_room(&self) -> bool {
        self.players.len() < self.rules.max_players
    }

    /// Players still in the game, in id order
    pub fn surviving_players(&self) -> Vec<PlayerId> {
        self.players
            .values()
            .filter(|player| !player.is_eliminated())
            .map(|player| player.id)
            .collect()
    }

    /// Seats a new player with the starting resources from the rules
    pub fn add_player(&mut self, id: PlayerId, name: &str, race: RaceId) -> Result<()> {
        self.require(GameStatus::Waiting, "add a player")?;
        if !self.has_room() {
            return Err(GameError::GameFull(self.rules.max_players));
        }
        if self.catalog.race(race).is_none() {
            return Err(GameError::UnknownRace(race));
        }

        let mut player = Player::new(id, name, race);
        player.ledger.gold = self.rules.starting_gold;
        player.ledger.intelligence = self.rules.starting_intelligence;
        player.buildings = self.rules.starting_buildings.clone();

        info!("Player {} ({}) joined game {}", id, name, self.id);
        self.players.insert(id, player);
        Ok(())
    }

    /// Removes a player before the game has started
    pub fn remove_player(&mut self, id: PlayerId) -> Result<Player> {
        self.require(GameStatus::Waiting, "remove a player")?;
        let player = self.players.remove(&id).ok_or(GameError::UnknownPlayer(id))?;
        info!("Player {} left game {}", id, self.id);
        Ok(player)
    }

    pub fn start(&mut self) -> Result<()> {
        self.require(GameStatus::Waiting, "start")?;
        if self.players.len() < self.rules.min_players {
            return Err(GameError::NotEnoughPlayers {
                required: self.rules.min_players,
                present: self.players.len(),
            });
        }

        self.status = GameStatus::Running;
        info!("Game {} started with {} players", self.id, self.players.len());
        Ok(())
    }

    pub fn end(&mut self) -> Result<()> {
        self.require(GameStatus::Running, "end")?;
        self.status = GameStatus::Ended;
        info!("Game {} ended on turn {}", self.id, self.turn);
        Ok(())
    }

    /// Validates and stores a player's orders for the next turn
    ///
    /// The batch replaces anything previously submitted this turn. A rejected
    /// batch leaves the player untouched, including their earlier orders.
    pub fn accept_orders(&mut self, player_id: PlayerId, orders: Vec<Order>) -> Result<()> {
        self.require(GameStatus::Running, "accept orders")?;
        let player = self
            .players
            .get(&player_id)
            .ok_or(GameError::UnknownPlayer(player_id))?;

        if let Err(rejection) = validate_batch(player, &orders, &self.players, &self.catalog, &self.rules) {
            warn!("Rejected orders from player {}: {}", player_id, rejection);
            return Err(rejection.into());
        }

        debug!("Player {} queued {} order(s)", player_id, orders.len());
        if let Some(player) = self.players.get_mut(&player_id) {
            player.pending_orders = orders;
        }
        Ok(())
    }

    /// Resolves one turn for every player
    ///
    /// Fails without touching any state unless the game is running. Once past
    /// that check the turn always runs to completion.
    pub fn next_turn(&mut self) -> Result<TurnReport> {
        self.require(GameStatus::Running, "advance the turn")?;

        let turn = self.turn;
        let mut context = AttackContext::snapshot(self.players.values());

        for player in self.players.values_mut() {
            execute_orders(player, &self.catalog, &mut context);
        }

        let mut report = TurnReport {
            turn,
            ..TurnReport::default()
        };
        for defender in context.defenders() {
            let Some(outcome) = resolve_defender(defender, &mut self.players, &context, &self.catalog, turn) else {
                continue;
            };
            if outcome.eliminated {
                report.eliminated.push(defender);
            }
            report.combats.extend(outcome.reports());
        }

        self.turn += 1;
        self.last_turn_at = Some(current_timestamp());

        let survivors = self.surviving_players();
        if survivors.len() <= 1 {
            self.status = GameStatus::Ended;
            report.winner = survivors.first().copied();
            info!("Game {} over after turn {}, winner: {:?}", self.id, turn, report.winner);
        }

        info!(
            "Game {} resolved turn {}: {} combat(s), {} eliminated",
            self.id,
            turn,
            report.combats.len(),
            report.eliminated.len()
        );
        Ok(report)
    }

    fn require(&self, status: GameStatus, operation: &'static str) -> Result<()> {
        if self.status == status {
            Ok(())
        } else {
            Err(GameError::InvalidState {
                operation,
                status: self.status,
            })
        }
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{BuildingTypeId, UnitTypeId};

    const SOLDIER: UnitTypeId = UnitTypeId(0);
    const KNIGHT: UnitTypeId = UnitTypeId(2);
    const MINE: BuildingTypeId = BuildingTypeId(0);

    fn new_game() -> Game {
        Game::new(GameId(1), Arc::new(Catalog::standard()), GameRules::default())
    }

    fn running_game(players: u32) -> Game {
        let mut game = new_game();
        for id in 1..=players {
            game.add_player(PlayerId(id), &format!("p{}", id), RaceId(0)).unwrap();
        }
        game.start().unwrap();
        game
    }

    #[test]
    fn test_new_game_is_waiting() {
        let game = new_game();
        assert_eq!(game.status(), GameStatus::Waiting);
        assert_eq!(game.turn(), 0);
        assert_eq!(game.last_turn_at(), None);
    }

    #[test]
    fn test_players_get_starting_resources() {
        let mut game = new_game();
        game.add_player(PlayerId(1), "alice", RaceId(2)).unwrap();

        let rules = GameRules::default();
        let player = game.player(PlayerId(1)).unwrap();
        assert_eq!(player.ledger.gold, rules.starting_gold);
        assert_eq!(player.buildings, rules.starting_buildings);
    }

    #[test]
    fn test_add_player_rules() {
        let mut game = new_game();
        assert_eq!(
            game.add_player(PlayerId(1), "x", RaceId(50)),
            Err(GameError::UnknownRace(RaceId(50)))
        );

        let max = GameRules::default().max_players as u32;
        for id in 1..=max {
            game.add_player(PlayerId(id), "p", RaceId(0)).unwrap();
        }
        assert!(matches!(
            game.add_player(PlayerId(max + 1), "late", RaceId(0)),
            Err(GameError::GameFull(_))
        ));
    }

    #[test]
    fn test_start_needs_enough_players() {
        let mut game = new_game();
        game.add_player(PlayerId(1), "solo", RaceId(0)).unwrap();
        assert_eq!(
            game.start(),
            Err(GameError::NotEnoughPlayers {
                required: 2,
                present: 1
            })
        );
        assert_eq!(game.status(), GameStatus::Waiting);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut game = new_game();
        assert!(matches!(
            game.next_turn(),
            Err(GameError::InvalidState {
                status: GameStatus::Waiting,
                ..
            })
        ));

        let mut game = running_game(2);
        assert!(matches!(
            game.add_player(PlayerId(9), "late", RaceId(0)),
            Err(GameError::InvalidState { .. })
        ));
        assert!(matches!(game.start(), Err(GameError::InvalidState { .. })));

        game.end().unwrap();
        assert!(matches!(
            game.next_turn(),
            Err(GameError::InvalidState {
                status: GameStatus::Ended,
                ..
            })
        ));
        assert!(matches!(
            game.accept_orders(PlayerId(1), vec![]),
            Err(GameError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_remove_player_while_waiting() {
        let mut game = new_game();
        game.add_player(PlayerId(1), "a", RaceId(0)).unwrap();
        assert!(game.remove_player(PlayerId(1)).is_ok());
        assert_eq!(game.player_count(), 0);
        assert_eq!(
            game.remove_player(PlayerId(1)),
            Err(GameError::UnknownPlayer(PlayerId(1)))
        );
    }

    #[test]
    fn test_turn_applies_production_and_orders() {
        let mut game = running_game(2);
        let gold_before = game.player(PlayerId(1)).unwrap().ledger.gold;

        game.accept_orders(
            PlayerId(1),
            vec![Order::CreateUnit {
                unit_type: SOLDIER,
                count: 3,
            }],
        )
        .unwrap();

        let report = game.next_turn().unwrap();
        assert_eq!(report.turn, 0);
        assert!(report.combats.is_empty());
        assert_eq!(game.turn(), 1);
        assert!(game.last_turn_at().is_some());

        let player = game.player(PlayerId(1)).unwrap();
        let production = 20.0; // one starting mine
        assert_eq!(player.units.get(SOLDIER), 3);
        assert_eq!(player.ledger.gold, gold_before + production - 30.0);
        assert!(player.pending_orders.is_empty());
    }

    #[test]
    fn test_rejected_batch_keeps_previous_orders() {
        let mut game = running_game(2);
        let accepted = vec![Order::CreateBuilding {
            building_type: MINE,
            count: 1,
        }];
        game.accept_orders(PlayerId(1), accepted.clone()).unwrap();
        let before = game.player(PlayerId(1)).unwrap().clone();

        let result = game.accept_orders(
            PlayerId(1),
            vec![Order::CreateUnit {
                unit_type: SOLDIER,
                count: 10_000,
            }],
        );

        assert!(matches!(result, Err(GameError::OrdersRejected(_))));
        assert_eq!(game.player(PlayerId(1)).unwrap(), &before);
        assert_eq!(game.player(PlayerId(1)).unwrap().pending_orders, accepted);
    }

    #[test]
    fn test_unknown_player_orders() {
        let mut game = running_game(2);
        assert_eq!(
            game.accept_orders(PlayerId(7), vec![]),
            Err(GameError::UnknownPlayer(PlayerId(7)))
        );
    }

    #[test]
    fn test_elimination_ends_two_player_game() {
        let mut game = running_game(2);

        // Give player 1 an army directly and send it at player 2.
        if let Some(player) = game.players.get_mut(&PlayerId(1)) {
            player.units.add(UnitTypeId(2), 20); // 240 damage
        }
        game.accept_orders(
            PlayerId(1),
            vec![Order::AttackPlayer {
                target: PlayerId(2),
                units: vec![(UnitTypeId(2), 20)].into_iter().collect(),
            }],
        )
        .unwrap();

        let report = game.next_turn().unwrap();

        assert_eq!(report.eliminated, vec![PlayerId(2)]);
        assert_eq!(report.winner, Some(PlayerId(1)));
        assert_eq!(game.status(), GameStatus::Ended);

        let loser = game.player(PlayerId(2)).unwrap();
        assert_eq!(loser.elimination_turn, Some(0));
        assert!(loser.buildings.is_empty());
        assert!(loser.units.is_empty());
    }

    #[test]
    fn test_mutual_attacks_resolve_both_defenders() {
        let mut game = running_game(3);
        for id in [1, 2] {
            if let Some(player) = game.players.get_mut(&PlayerId(id)) {
                player.units.add(SOLDIER, 10);
            }
        }

        let strike = |target| Order::AttackPlayer {
            target: PlayerId(target),
            units: vec![(SOLDIER, 4)].into_iter().collect(),
        };
        game.accept_orders(PlayerId(1), vec![strike(2)]).unwrap();
        game.accept_orders(PlayerId(2), vec![strike(1)]).unwrap();

        let report = game.next_turn().unwrap();
        let defenders: Vec<PlayerId> = report.combats.iter().map(|c| c.defender).collect();
        assert_eq!(defenders, vec![PlayerId(1), PlayerId(2)]);
        assert!(report.eliminated.is_empty());
        assert_eq!(game.status(), GameStatus::Running);
    }

    #[test]
    fn test_army_of_player_eliminated_earlier_in_turn_is_lost() {
        let mut game = running_game(3);
        if let Some(player) = game.players.get_mut(&PlayerId(1)) {
            player.units.add(SOLDIER, 30);
        }
        if let Some(player) = game.players.get_mut(&PlayerId(3)) {
            player.units.add(KNIGHT, 20);
        }

        // 150 damage would break player 2, but player 1 falls to 240 damage first
        let send = |target, unit_type, count| Order::AttackPlayer {
            target: PlayerId(target),
            units: vec![(unit_type, count)].into_iter().collect(),
        };
        game.accept_orders(PlayerId(1), vec![send(2, SOLDIER, 30)]).unwrap();
        game.accept_orders(PlayerId(3), vec![send(1, KNIGHT, 20)]).unwrap();

        let report = game.next_turn().unwrap();
        assert_eq!(report.eliminated, vec![PlayerId(1)]);
        assert!(report.combats.iter().all(|c| c.defender == PlayerId(1)));
        assert_eq!(report.combats[0].destroyed_units.get(SOLDIER), 30);

        let survivor = game.player(PlayerId(2)).unwrap();
        assert!(!survivor.is_eliminated());
        assert_eq!(survivor.buildings, GameRules::default().starting_buildings);
        assert_eq!(game.status(), GameStatus::Running);
    }
}
