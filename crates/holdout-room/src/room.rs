//! Room actor: one Tokio task per room, owning every mutation of it.
//!
//! All room-scoped operations arrive as [`RoomCommand`]s on a bounded
//! channel and are handled one at a time, so check-then-act sequences
//! (phase checks, ballot completion) are atomic per room while different
//! rooms run in parallel. Callers talk to the actor through a cloneable
//! [`RoomHandle`] and wait for the answer on a `oneshot` reply channel.
//!
//! The store is the source of truth: each command re-reads the room row
//! instead of trusting a cached copy.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{mpsc, oneshot};

use holdout_protocol::{
    AssignmentId, BallotKind, CardView, Phase, PlayerId, PlayerView, RoomEvent,
    RoomId, RoomSnapshot, ScenarioId, ScenarioKind, UserId,
};
use holdout_store::{
    AssignmentQuery, BallotKey, NewPlayer, NewVote, Player, PlayerQuery, Room,
    Store, VoteFilter,
};
use holdout_timer::DeferredTasks;

use crate::ballot::{self, Outcome};
use crate::config::survivor_threshold;
use crate::{Broadcast, GameConfig, GameError, dealer, phase, scenario, views};

type Reply<T> = oneshot::Sender<Result<T, GameError>>;

/// Result of a successful join.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub room_id: RoomId,
    pub room_code: String,
    pub player_id: PlayerId,
    pub room: RoomSnapshot,
    pub players: Vec<PlayerView>,
    /// The user already had a seat; no new player was created.
    pub rejoined: bool,
}

/// What a reconnecting player needs to rebuild their screen.
#[derive(Debug, Clone)]
pub struct ResumeOutcome {
    pub room: RoomSnapshot,
    pub players: Vec<PlayerView>,
    pub player_id: PlayerId,
    pub hand: Vec<CardView>,
}

pub(crate) enum RoomCommand {
    Join {
        user: UserId,
        name: String,
        reply: Reply<JoinOutcome>,
    },
    Resume {
        user: UserId,
        reply: Reply<ResumeOutcome>,
    },
    /// Re-read the registry and publish the player's presence if it
    /// changed. Sent after every bind and unbind.
    SyncPresence {
        player: PlayerId,
    },
    Start {
        requester: PlayerId,
        reply: Reply<()>,
    },
    CastVote {
        voter: PlayerId,
        kind: BallotKind,
        candidate: u64,
        reply: Reply<()>,
    },
    RevealCard {
        player: PlayerId,
        assignment: AssignmentId,
        reply: Reply<()>,
    },
    OpenElimination {
        requester: PlayerId,
        reply: Reply<()>,
    },
    Kick {
        requester: PlayerId,
        target: PlayerId,
        reply: Reply<()>,
    },
    /// Fired by the announcement timer.
    AdvanceAfterElimination {
        round: u32,
    },
    Snapshot {
        reply: Reply<(RoomSnapshot, Vec<PlayerView>)>,
    },
    Close {
        reply: Reply<()>,
    },
}

/// Handle to a running room actor. Cheap to clone.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    code: Arc<str>,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Whether the actor is still running.
    pub fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> RoomCommand,
    ) -> Result<T, GameError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(make(reply))
            .await
            .map_err(|_| GameError::Unavailable(self.room_id))?;
        rx.await.map_err(|_| GameError::Unavailable(self.room_id))?
    }

    pub async fn join(&self, user: UserId, name: String) -> Result<JoinOutcome, GameError> {
        self.request(|reply| RoomCommand::Join { user, name, reply }).await
    }

    pub async fn resume(&self, user: UserId) -> Result<ResumeOutcome, GameError> {
        self.request(|reply| RoomCommand::Resume { user, reply }).await
    }

    /// Fire-and-forget presence refresh.
    pub async fn sync_presence(&self, player: PlayerId) -> Result<(), GameError> {
        self.sender
            .send(RoomCommand::SyncPresence { player })
            .await
            .map_err(|_| GameError::Unavailable(self.room_id))
    }

    pub async fn start(&self, requester: PlayerId) -> Result<(), GameError> {
        self.request(|reply| RoomCommand::Start { requester, reply }).await
    }

    /// `candidate` is a scenario id for scenario ballots and a player id
    /// for elimination.
    pub async fn cast_vote(
        &self,
        voter: PlayerId,
        kind: BallotKind,
        candidate: u64,
    ) -> Result<(), GameError> {
        self.request(|reply| RoomCommand::CastVote {
            voter,
            kind,
            candidate,
            reply,
        })
        .await
    }

    pub async fn reveal_card(
        &self,
        player: PlayerId,
        assignment: AssignmentId,
    ) -> Result<(), GameError> {
        self.request(|reply| RoomCommand::RevealCard {
            player,
            assignment,
            reply,
        })
        .await
    }

    pub async fn open_elimination(&self, requester: PlayerId) -> Result<(), GameError> {
        self.request(|reply| RoomCommand::OpenElimination { requester, reply })
            .await
    }

    pub async fn kick(&self, requester: PlayerId, target: PlayerId) -> Result<(), GameError> {
        self.request(|reply| RoomCommand::Kick {
            requester,
            target,
            reply,
        })
        .await
    }

    pub async fn snapshot(&self) -> Result<(RoomSnapshot, Vec<PlayerView>), GameError> {
        self.request(|reply| RoomCommand::Snapshot { reply }).await
    }

    /// Tears the room down: notifies and unbinds everyone, deletes all of
    /// its rows and stops the actor.
    pub async fn close(&self) -> Result<(), GameError> {
        self.request(|reply| RoomCommand::Close { reply }).await
    }
}

struct RoomActor<S, B> {
    room_id: RoomId,
    store: S,
    broadcast: Arc<B>,
    config: Arc<GameConfig>,
    timers: Arc<DeferredTasks<RoomId>>,
    /// For timers to reach the actor without keeping it alive.
    commands: mpsc::WeakSender<RoomCommand>,
}

fn deadline_after(d: Duration) -> DateTime<Utc> {
    let now = Utc::now();
    TimeDelta::from_std(d)
        .ok()
        .and_then(|td| now.checked_add_signed(td))
        .unwrap_or(now)
}

impl<S: Store, B: Broadcast> RoomActor<S, B> {
    async fn run(self, mut receiver: mpsc::Receiver<RoomCommand>) {
        tracing::info!(room_id = %self.room_id, "room actor started");

        while let Some(cmd) = receiver.recv().await {
            match cmd {
                RoomCommand::Join { user, name, reply } => {
                    let _ = reply.send(self.handle_join(user, name).await);
                }
                RoomCommand::Resume { user, reply } => {
                    let _ = reply.send(self.handle_resume(user).await);
                }
                RoomCommand::SyncPresence { player } => {
                    if let Err(e) = self.handle_sync_presence(player).await {
                        tracing::warn!(room_id = %self.room_id, %player, error = %e, "presence sync failed");
                    }
                }
                RoomCommand::Start { requester, reply } => {
                    let _ = reply.send(self.handle_start(requester).await);
                }
                RoomCommand::CastVote {
                    voter,
                    kind,
                    candidate,
                    reply,
                } => {
                    let _ = reply.send(self.handle_vote(voter, kind, candidate).await);
                }
                RoomCommand::RevealCard {
                    player,
                    assignment,
                    reply,
                } => {
                    let _ = reply.send(self.handle_reveal(player, assignment).await);
                }
                RoomCommand::OpenElimination { requester, reply } => {
                    let _ = reply.send(self.handle_open_elimination(requester).await);
                }
                RoomCommand::Kick {
                    requester,
                    target,
                    reply,
                } => {
                    let _ = reply.send(self.handle_kick(requester, target).await);
                }
                RoomCommand::AdvanceAfterElimination { round } => {
                    if let Err(e) = self.handle_advance(round).await {
                        tracing::error!(room_id = %self.room_id, round, error = %e, "post-elimination advance failed");
                    }
                }
                RoomCommand::Snapshot { reply } => {
                    let result = match self.room().await {
                        Ok(room) => self.room_view(&room).await,
                        Err(e) => Err(e),
                    };
                    let _ = reply.send(result);
                }
                RoomCommand::Close { reply } => {
                    let _ = reply.send(self.handle_close().await);
                    break;
                }
            }
        }

        tracing::info!(room_id = %self.room_id, "room actor stopped");
    }

    // -- lookups ----------------------------------------------------------

    async fn room(&self) -> Result<Room, GameError> {
        self.store
            .find_room(self.room_id)
            .await?
            .ok_or(GameError::RoomNotFound)
    }

    /// A player of this room.
    async fn member(&self, id: PlayerId) -> Result<Player, GameError> {
        match self.store.find_player(id).await? {
            Some(p) if p.room == self.room_id => Ok(p),
            _ => Err(GameError::PlayerNotFound),
        }
    }

    async fn players(&self) -> Result<Vec<Player>, GameError> {
        Ok(self
            .store
            .find_players(PlayerQuery::in_room(self.room_id))
            .await?)
    }

    async fn living(&self) -> Result<Vec<Player>, GameError> {
        Ok(self
            .store
            .find_players(PlayerQuery::in_room(self.room_id).alive_only())
            .await?)
    }

    fn ballot_key(room: &Room, kind: BallotKind) -> BallotKey {
        BallotKey {
            room: room.id,
            kind,
            round: if kind.is_scenario() { 0 } else { room.current_round },
        }
    }

    /// Counts the ballot against its electorate: every player for
    /// scenario ballots, living players for elimination.
    async fn count(&self, room: &Room, kind: BallotKind) -> Result<Outcome, GameError> {
        let entries = self
            .store
            .find_votes(VoteFilter::ballot(Self::ballot_key(room, kind)))
            .await?;
        let electorate = if kind.is_scenario() {
            self.players().await?
        } else {
            self.living().await?
        };
        let eligible: HashSet<PlayerId> = electorate.iter().map(|p| p.id).collect();
        Ok(ballot::count(&entries, &eligible))
    }

    async fn room_view(&self, room: &Room) -> Result<(RoomSnapshot, Vec<PlayerView>), GameError> {
        let players = self.players().await?;
        let ballot = match room.phase.open_ballot() {
            Some(kind) => Some(self.count(room, kind).await?.view(kind, Self::ballot_key(room, kind).round)),
            None => None,
        };
        let snapshot = views::snapshot(&self.store, room, &players, ballot).await?;
        let players = views::players(&self.store, room, &players).await?;
        Ok((snapshot, players))
    }

    async fn publish_room(&self, room: &Room) -> Result<(), GameError> {
        let (snapshot, players) = self.room_view(room).await?;
        self.broadcast.to_room(
            self.room_id,
            RoomEvent::RoomUpdated {
                room: snapshot,
                players,
            },
        );
        Ok(())
    }

    async fn draw_candidates(&self, kind: ScenarioKind) -> Result<Vec<ScenarioId>, GameError> {
        let pool = self.store.scenarios(kind).await?;
        let picks = {
            let mut rng = rand::rng();
            scenario::sample(&pool, self.config.candidates_per_ballot, &mut rng)
        };
        if picks.is_empty() {
            return Err(GameError::InvalidRequest(format!("no {kind:?} scenarios available")));
        }
        Ok(picks.iter().map(|s| s.id).collect())
    }

    async fn announce_candidates(&self, room: &Room, kind: BallotKind) -> Result<(), GameError> {
        let mut candidates = Vec::with_capacity(room.candidates.len());
        for id in &room.candidates {
            if let Some(s) = self.store.find_scenario(*id).await? {
                candidates.push(scenario::view(&s));
            }
        }
        self.broadcast
            .to_room(self.room_id, RoomEvent::ScenarioCandidates { kind, candidates });
        Ok(())
    }

    // -- membership -------------------------------------------------------

    async fn handle_join(&self, user: UserId, name: String) -> Result<JoinOutcome, GameError> {
        let room = self.room().await?;

        let existing = self
            .store
            .find_players(PlayerQuery::in_room(self.room_id).user(user))
            .await?;
        if let Some(player) = existing.into_iter().next() {
            tracing::debug!(room_id = %self.room_id, player_id = %player.id, "user rejoined existing seat");
            let (snapshot, players) = self.room_view(&room).await?;
            return Ok(JoinOutcome {
                room_id: room.id,
                room_code: room.code,
                player_id: player.id,
                room: snapshot,
                players,
                rejoined: true,
            });
        }

        if !room.phase.is_joinable() {
            return Err(GameError::IllegalPhase {
                action: "join",
                phase: room.phase,
            });
        }
        let players = self.players().await?;
        if players.len() >= usize::from(room.capacity) {
            return Err(GameError::RoomFull);
        }

        let player = self
            .store
            .insert_player(NewPlayer {
                user,
                room: room.id,
                name,
                host: players.is_empty(),
                online: false,
                joined_at: Utc::now(),
            })
            .await?;
        tracing::info!(
            room_id = %self.room_id,
            player_id = %player.id,
            host = player.host,
            players = players.len() + 1,
            "player joined"
        );

        let (snapshot, views) = self.room_view(&room).await?;
        if let Some(view) = views.iter().find(|v| v.id == player.id) {
            self.broadcast.to_room_except(
                self.room_id,
                player.id,
                RoomEvent::PlayerJoined {
                    player: view.clone(),
                },
            );
        }
        self.broadcast.to_room(
            self.room_id,
            RoomEvent::RoomUpdated {
                room: snapshot.clone(),
                players: views.clone(),
            },
        );

        Ok(JoinOutcome {
            room_id: room.id,
            room_code: room.code,
            player_id: player.id,
            room: snapshot,
            players: views,
            rejoined: false,
        })
    }

    async fn handle_resume(&self, user: UserId) -> Result<ResumeOutcome, GameError> {
        let room = self.room().await?;
        let player = self
            .store
            .find_players(PlayerQuery::in_room(self.room_id).user(user))
            .await?
            .into_iter()
            .next()
            .ok_or(GameError::PlayerNotFound)?;

        let hand = self
            .store
            .find_assignments(AssignmentQuery::for_player(player.id).with_card())
            .await?
            .iter()
            .filter_map(views::card)
            .collect();
        let (snapshot, players) = self.room_view(&room).await?;

        tracing::debug!(room_id = %self.room_id, player_id = %player.id, "session resumed");
        Ok(ResumeOutcome {
            room: snapshot,
            players,
            player_id: player.id,
            hand,
        })
    }

    async fn handle_sync_presence(&self, player: PlayerId) -> Result<(), GameError> {
        let Ok(mut p) = self.member(player).await else {
            return Ok(());
        };
        let online = self.broadcast.is_connected(player);
        if p.online == online {
            return Ok(());
        }
        p.online = online;
        self.store.update_player(&p).await?;
        tracing::debug!(room_id = %self.room_id, %player, online, "presence changed");
        self.broadcast.to_room(
            self.room_id,
            RoomEvent::PlayerPresence {
                player_id: player,
                online,
            },
        );
        Ok(())
    }

    async fn handle_kick(&self, requester: PlayerId, target: PlayerId) -> Result<(), GameError> {
        let room = self.room().await?;
        if !self.member(requester).await?.host {
            return Err(GameError::NotHost);
        }
        let target = self.member(target).await?;
        if target.host {
            return Err(GameError::CannotKickHost);
        }

        self.store.delete_player(target.id).await?;
        tracing::info!(room_id = %self.room_id, player_id = %target.id, "player kicked");

        self.broadcast.to_player(
            target.id,
            RoomEvent::Kicked {
                room_code: room.code.clone(),
            },
        );
        self.broadcast.disconnect(target.id);
        self.broadcast.to_room(
            self.room_id,
            RoomEvent::PlayerRemoved {
                player_id: target.id,
            },
        );
        self.publish_room(&room).await?;

        // The electorate shrank; the open ballot may now be complete.
        if let Err(e) = self.reevaluate(room).await {
            tracing::warn!(room_id = %self.room_id, error = %e, "re-evaluation after kick failed");
        }
        Ok(())
    }

    async fn reevaluate(&self, room: Room) -> Result<(), GameError> {
        if matches!(room.phase, Phase::Discussion | Phase::EliminationVote) {
            if let Some(survivors) = self.survivors_if_decided(&room).await? {
                // a pending announcement would advance a finished room
                self.timers.cancel(&self.room_id);
                return self.finish(room, survivors).await;
            }
        }
        if let Some(kind) = room.phase.open_ballot() {
            if room.ballot_closed {
                return Ok(());
            }
            let outcome = self.count(&room, kind).await?;
            self.publish_tally(&room, kind, &outcome);
            if outcome.is_complete() {
                self.complete_ballot(room, kind, outcome).await?;
            }
        } else if room.phase == Phase::Discussion && self.all_revealed(&room).await? {
            self.open_elimination(room).await?;
        }
        Ok(())
    }

    // -- phase machine ----------------------------------------------------

    async fn handle_start(&self, requester: PlayerId) -> Result<(), GameError> {
        let mut room = self.room().await?;
        phase::require(&room, Phase::Waiting, "start the game")?;
        if !self.member(requester).await?.host {
            return Err(GameError::NotHost);
        }
        let players = self.players().await?;
        if players.len() < self.config.min_players {
            return Err(GameError::InsufficientPlayers {
                have: players.len(),
                need: self.config.min_players,
            });
        }

        let candidates = self.draw_candidates(ScenarioKind::Hazard).await?;
        phase::advance(&mut room, Phase::ScenarioHazardVote)?;
        let started_at = Utc::now();
        room.started_at = Some(started_at);
        room.candidates = candidates;
        self.store.update_room(&room).await?;

        tracing::info!(room_id = %self.room_id, players = players.len(), "game started");
        self.broadcast
            .to_room(self.room_id, RoomEvent::GameStarted { started_at });
        self.announce_candidates(&room, BallotKind::ScenarioHazard).await
    }

    async fn handle_vote(&self, voter: PlayerId, kind: BallotKind, candidate: u64) -> Result<(), GameError> {
        let room = self.room().await?;
        if room.phase.open_ballot() != Some(kind) || room.ballot_closed {
            return Err(GameError::IllegalPhase {
                action: "vote",
                phase: room.phase,
            });
        }
        let voter = self.member(voter).await?;

        if kind.is_scenario() {
            if !room.candidates.contains(&ScenarioId(candidate)) {
                return Err(GameError::InvalidCandidate(format!(
                    "scenario {candidate} is not on this ballot"
                )));
            }
        } else {
            if !voter.alive {
                return Err(GameError::NotAlive);
            }
            let target = PlayerId(candidate);
            if target == voter.id {
                return Err(GameError::InvalidCandidate("cannot vote for yourself".into()));
            }
            match self.member(target).await {
                Ok(p) if p.alive => {}
                _ => {
                    return Err(GameError::InvalidCandidate(format!(
                        "{target} is not a living player of this room"
                    )));
                }
            }
        }

        self.store
            .replace_vote(NewVote {
                ballot: Self::ballot_key(&room, kind),
                voter: voter.id,
                candidate,
            })
            .await?;

        let outcome = self.count(&room, kind).await?;
        tracing::debug!(
            room_id = %self.room_id,
            voter = %voter.id,
            ?kind,
            candidate,
            cast = outcome.cast,
            eligible = outcome.eligible,
            "vote recorded"
        );
        self.publish_tally(&room, kind, &outcome);

        if outcome.is_complete() {
            self.complete_ballot(room, kind, outcome).await?;
        }
        Ok(())
    }

    fn publish_tally(&self, room: &Room, kind: BallotKind, outcome: &Outcome) {
        self.broadcast.to_room(
            self.room_id,
            RoomEvent::VoteTallied {
                kind,
                round: Self::ballot_key(room, kind).round,
                cast: outcome.cast,
                eligible: outcome.eligible,
                tally: outcome.tally.clone(),
            },
        );
    }

    /// Applies a complete ballot's result. Re-checks that the ballot is
    /// still the open one, so a result is applied at most once.
    async fn complete_ballot(&self, mut room: Room, kind: BallotKind, outcome: Outcome) -> Result<(), GameError> {
        if room.phase != kind.phase() || room.ballot_closed {
            return Ok(());
        }
        let Some(winner) = outcome.winner() else {
            return Ok(());
        };

        match kind {
            BallotKind::ScenarioHazard | BallotKind::ScenarioLocation => {
                let chosen = self
                    .store
                    .find_scenario(ScenarioId(winner))
                    .await?
                    .filter(|s| Some(s.kind) == kind.scenario_kind())
                    .ok_or_else(|| {
                        GameError::InvalidCandidate(format!("scenario {winner} is not a {kind:?} option"))
                    })?;

                if kind == BallotKind::ScenarioHazard {
                    let next = self.draw_candidates(ScenarioKind::Location).await?;
                    room.hazard = Some(chosen.id);
                    phase::advance(&mut room, Phase::ScenarioLocationVote)?;
                    room.candidates = next;
                } else {
                    room.location = Some(chosen.id);
                    phase::advance(&mut room, Phase::Dealing)?;
                    room.candidates.clear();
                }
                self.store.update_room(&room).await?;

                tracing::info!(room_id = %self.room_id, ?kind, scenario = %chosen.id, "scenario chosen");
                self.broadcast.to_room(
                    self.room_id,
                    RoomEvent::ScenarioWinner {
                        kind,
                        scenario: scenario::view(&chosen),
                        tally: outcome.tally,
                    },
                );

                match room.phase {
                    Phase::ScenarioLocationVote => {
                        self.announce_candidates(&room, BallotKind::ScenarioLocation).await
                    }
                    _ => self.deal(room).await,
                }
            }
            BallotKind::Elimination => self.eliminate(room, PlayerId(winner), outcome).await,
        }
    }

    /// Deals every living player one card per category, then opens round 1.
    /// On failure the room stays in `DEALING`.
    async fn deal(&self, mut room: Room) -> Result<(), GameError> {
        phase::require(&room, Phase::Dealing, "deal")?;

        let already = self
            .store
            .find_assignments(AssignmentQuery::in_room(room.id))
            .await?;
        if already.is_empty() {
            let living: Vec<PlayerId> = self.living().await?.iter().map(|p| p.id).collect();
            let pool = self.store.cards().await?;
            let planned = {
                let mut rng = rand::rng();
                dealer::plan(room.id, pool, &living, &mut rng)
            };
            let batch = planned.inspect_err(|e| {
                tracing::error!(room_id = %self.room_id, error = %e, "deal failed; room stays in DEALING");
            })?;
            self.store.insert_assignments(batch).await?;
            tracing::info!(room_id = %self.room_id, players = living.len(), "hands dealt");
        }

        phase::advance(&mut room, Phase::Discussion)?;
        room.current_round = 1;
        let deadline = deadline_after(self.config.round_duration(room.variant));
        room.round_deadline = Some(deadline);
        self.store.update_room(&room).await?;

        for player in self.living().await? {
            let cards = self
                .store
                .find_assignments(AssignmentQuery::for_player(player.id).with_card())
                .await?
                .iter()
                .filter_map(views::card)
                .collect();
            self.broadcast
                .to_player(player.id, RoomEvent::HandDealt { cards });
        }
        self.broadcast.to_room(
            self.room_id,
            RoomEvent::RoundStarted {
                round: room.current_round,
                deadline,
            },
        );
        Ok(())
    }

    async fn handle_reveal(&self, player: PlayerId, assignment: AssignmentId) -> Result<(), GameError> {
        let room = self.room().await?;
        phase::require(&room, Phase::Discussion, "reveal a card")?;
        let player = self.member(player).await?;
        if !player.alive {
            return Err(GameError::NotAlive);
        }

        let hand = self
            .store
            .find_assignments(AssignmentQuery::for_player(player.id).with_card())
            .await?;
        if hand
            .iter()
            .any(|a| a.assignment.revealed_round == Some(room.current_round))
        {
            return Err(GameError::AlreadyRevealedThisRound);
        }
        let Some(mut card) = hand.into_iter().find(|a| a.assignment.id == assignment) else {
            return Err(GameError::InvalidCard(format!("{assignment} is not in your hand")));
        };
        if card.assignment.revealed {
            return Err(GameError::InvalidCard(format!("{assignment} is already revealed")));
        }

        card.assignment.revealed = true;
        card.assignment.revealed_round = Some(room.current_round);
        self.store.update_assignment(&card.assignment).await?;

        tracing::debug!(
            room_id = %self.room_id,
            player_id = %player.id,
            category = %card.assignment.category,
            round = room.current_round,
            "card revealed"
        );
        if let Some(view) = views::card(&card) {
            self.broadcast.to_room(
                self.room_id,
                RoomEvent::CardRevealed {
                    player_id: player.id,
                    round: room.current_round,
                    card: view,
                },
            );
        }

        if self.all_revealed(&room).await? {
            self.open_elimination(room).await?;
        }
        Ok(())
    }

    /// Every living player has revealed a card this round.
    async fn all_revealed(&self, room: &Room) -> Result<bool, GameError> {
        let revealed: HashSet<PlayerId> = self
            .store
            .find_assignments(AssignmentQuery::in_room(room.id).revealed(true))
            .await?
            .iter()
            .filter(|a| a.assignment.revealed_round == Some(room.current_round))
            .map(|a| a.assignment.player)
            .collect();
        let living = self.living().await?;
        Ok(!living.is_empty() && living.iter().all(|p| revealed.contains(&p.id)))
    }

    async fn handle_open_elimination(&self, requester: PlayerId) -> Result<(), GameError> {
        let room = self.room().await?;
        phase::require(&room, Phase::Discussion, "open the elimination vote")?;
        if !self.member(requester).await?.host {
            return Err(GameError::NotHost);
        }
        self.open_elimination(room).await
    }

    /// Opens the elimination ballot, or ends the game when too few players
    /// are left for one to matter.
    async fn open_elimination(&self, mut room: Room) -> Result<(), GameError> {
        if let Some(survivors) = self.survivors_if_decided(&room).await? {
            return self.finish(room, survivors).await;
        }
        phase::advance(&mut room, Phase::EliminationVote)?;
        room.ballot_closed = false;
        self.store.update_room(&room).await?;
        self.broadcast.to_room(
            self.room_id,
            RoomEvent::EliminationOpened {
                round: room.current_round,
            },
        );
        Ok(())
    }

    async fn eliminate(&self, mut room: Room, target: PlayerId, outcome: Outcome) -> Result<(), GameError> {
        let mut player = self.member(target).await?;
        player.alive = false;
        self.store.update_player(&player).await?;
        room.ballot_closed = true;
        self.store.update_room(&room).await?;

        let round = room.current_round;
        tracing::info!(room_id = %self.room_id, player_id = %target, round, "player eliminated");
        self.broadcast.to_room(
            self.room_id,
            RoomEvent::PlayerEliminated {
                player_id: target,
                round,
                tally: outcome.tally,
            },
        );

        let commands = self.commands.clone();
        self.timers
            .schedule(self.room_id, self.config.announcement_delay, async move {
                if let Some(tx) = commands.upgrade() {
                    let _ = tx
                        .send(RoomCommand::AdvanceAfterElimination { round })
                        .await;
                }
            });
        Ok(())
    }

    /// Runs after the announcement delay. A stale timer (the room moved
    /// on, or was reset) does nothing.
    async fn handle_advance(&self, round: u32) -> Result<(), GameError> {
        let Ok(mut room) = self.room().await else {
            return Ok(());
        };
        if room.phase != Phase::EliminationVote || room.current_round != round || !room.ballot_closed {
            tracing::debug!(room_id = %self.room_id, round, "stale advance ignored");
            return Ok(());
        }

        if let Some(survivors) = self.survivors_if_decided(&room).await? {
            return self.finish(room, survivors).await;
        }

        room.ballot_closed = false;
        phase::advance(&mut room, Phase::Discussion)?;
        room.current_round += 1;
        let deadline = deadline_after(self.config.round_duration(room.variant));
        room.round_deadline = Some(deadline);
        self.store.update_room(&room).await?;
        self.broadcast.to_room(
            self.room_id,
            RoomEvent::RoundStarted {
                round: room.current_round,
                deadline,
            },
        );
        Ok(())
    }

    /// The living players, when there are no more of them than the
    /// location's survivor threshold.
    async fn survivors_if_decided(&self, room: &Room) -> Result<Option<Vec<Player>>, GameError> {
        let living = self.living().await?;
        let location = match room.location {
            Some(id) => self.store.find_scenario(id).await?,
            None => None,
        };
        let threshold = survivor_threshold(location.as_ref());
        Ok((living.len() <= threshold).then_some(living))
    }

    async fn finish(&self, mut room: Room, survivors: Vec<Player>) -> Result<(), GameError> {
        phase::advance(&mut room, Phase::Finished)?;
        room.ballot_closed = false;
        room.round_deadline = None;
        room.finished_at = Some(Utc::now());
        self.store.update_room(&room).await?;
        let winners: Vec<PlayerId> = survivors.iter().map(|p| p.id).collect();
        tracing::info!(room_id = %self.room_id, round = room.current_round, survivors = winners.len(), "game finished");
        self.broadcast
            .to_room(self.room_id, RoomEvent::GameEnded { winners });
        Ok(())
    }

    async fn handle_close(&self) -> Result<(), GameError> {
        self.timers.cancel(&self.room_id);
        let room = self.room().await?;
        let players = self.players().await?;

        self.broadcast.to_room(
            self.room_id,
            RoomEvent::RoomClosed {
                room_code: room.code.clone(),
            },
        );
        for p in &players {
            self.broadcast.disconnect(p.id);
        }
        self.store.purge_room(self.room_id).await?;
        tracing::info!(room_id = %self.room_id, code = %room.code, "room closed");
        Ok(())
    }
}

/// Spawns a room actor and returns its handle.
pub(crate) fn spawn_room<S: Store, B: Broadcast>(
    room: &Room,
    store: S,
    broadcast: Arc<B>,
    config: Arc<GameConfig>,
    timers: Arc<DeferredTasks<RoomId>>,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.channel_size.max(1));

    let actor = RoomActor {
        room_id: room.id,
        store,
        broadcast,
        config,
        timers,
        commands: tx.downgrade(),
    };
    tokio::spawn(actor.run(rx));

    RoomHandle {
        room_id: room.id,
        code: Arc::from(room.code.as_str()),
        sender: tx,
    }
}
