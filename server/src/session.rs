//! The authoritative session shared by both players
//!
//! [`Session`] owns every piece of state the server is authoritative for and
//! turns each inbound [`ClientEvent`] into a [`Dispatch`]: the outbound
//! events to deliver and the action records to log. Handlers run to
//! completion synchronously and validate before they mutate, so the
//! transport can process events one at a time on a single task without any
//! locking.

use crate::action_log::ActionRecord;
use crate::category_pool::CategoryPool;
use crate::levels::CompletedLevels;
use crate::nail_registry::{NailRegistry, NailSpec, Registration};
use crate::push_gate::{PushGate, PushOutcome};
use crate::turn::TurnState;
use crate::validation::validate_event;
use log::{debug, info, warn};
use shared::{
    Category, ChainLink, ClientEvent, LevelChange, LevelId, PinRequest, PushRejection, ResolvedPin,
    ServerEvent, ShapeStroke, Vec2, CATEGORY_UNIVERSE, LOCKED_PUSH_LEVEL, PLAYER_ONE, PLAYER_TWO,
    PUSH_COOLDOWN_MS,
};

/// Tunables of the shared session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub push_cooldown_ms: u64,
    /// Level on which only one push is allowed. None disables the lock.
    pub locked_level: Option<LevelId>,
    pub players: (String, String),
    pub categories: Vec<Category>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            push_cooldown_ms: PUSH_COOLDOWN_MS,
            locked_level: Some(LOCKED_PUSH_LEVEL),
            players: (PLAYER_ONE.to_string(), PLAYER_TWO.to_string()),
            categories: CATEGORY_UNIVERSE.to_vec(),
        }
    }
}

/// Who receives an outbound event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    All,
    /// Everyone except the connection that sent the event
    Others,
    Sender,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub to: Recipient,
    pub event: ServerEvent,
}

/// Everything one inbound event produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dispatch {
    pub outbound: Vec<Outbound>,
    pub records: Vec<ActionRecord>,
}

impl Dispatch {
    fn send(&mut self, to: Recipient, event: ServerEvent) {
        self.outbound.push(Outbound { to, event });
    }

    fn log(&mut self, record: ActionRecord) {
        self.records.push(record);
    }

    fn error(event_name: &str, message: impl ToString) -> Self {
        let mut dispatch = Self::default();
        dispatch.send(
            Recipient::Sender,
            ServerEvent::Error {
                event: event_name.to_string(),
                message: message.to_string(),
            },
        );
        dispatch
    }

    pub fn is_empty(&self) -> bool {
        self.outbound.is_empty() && self.records.is_empty()
    }

    /// Outbound events addressed to everyone
    pub fn broadcasts(&self) -> impl Iterator<Item = &ServerEvent> {
        self.outbound
            .iter()
            .filter(|o| o.to == Recipient::All)
            .map(|o| &o.event)
    }
}

pub struct Session {
    config: SessionConfig,
    pool: CategoryPool,
    nails: NailRegistry,
    turn: TurnState,
    push_gate: PushGate,
    completed: CompletedLevels,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        let (first, second) = config.players.clone();
        Self {
            pool: CategoryPool::with_universe(&config.categories),
            nails: NailRegistry::new(),
            turn: TurnState::new(first, second),
            push_gate: PushGate::new(config.push_cooldown_ms, config.locked_level),
            completed: CompletedLevels::new(),
            config,
        }
    }

    /// Handles one inbound event from `client_id` at wall-clock `now_ms`
    pub fn handle(&mut self, client_id: u32, event: ClientEvent, now_ms: u64) -> Dispatch {
        if let Err(e) = validate_event(&event) {
            warn!("Rejected {} from client {}: {}", event.name(), client_id, e);
            return Dispatch::error(event.name(), e);
        }

        debug!("Client {} sent {}", client_id, event.name());

        match event {
            ClientEvent::MouseMove { x, y, player_id } => {
                relay(ServerEvent::MouseMove { x, y, player_id })
            }
            ClientEvent::DrawShape(shape) => self.draw_shape(shape, now_ms),
            ClientEvent::DrawPin(pin) => self.draw_pin(pin, now_ms),
            ClientEvent::RegisterPin(pin) => self.register_pin(pin),
            ClientEvent::CreateChain(chain) => self.create_chain(chain, now_ms),
            ClientEvent::ChangeHingePosition {
                level,
                hinge_pos_index,
                player_id,
            } => relay(ServerEvent::ChangeHingePosition {
                level,
                hinge_pos_index,
                player_id,
            }),
            ClientEvent::ReleaseCategory { category, .. } => {
                if let Some(category) = category {
                    self.pool.release(category);
                }
                Dispatch::default()
            }
            ClientEvent::Erase {
                custom_id,
                player_id,
                current_level,
                is_fall,
            } => self.erase(custom_id, player_id, current_level, is_fall, now_ms),
            ClientEvent::Push {
                force,
                player_id,
                current_level,
            } => self.push(force, player_id, current_level, now_ms),
            ClientEvent::ChangeTool {
                tool,
                player_id,
                current_level,
            } => {
                let mut dispatch = relay(ServerEvent::ChangeTool {
                    tool: tool.clone(),
                    player_id: player_id.clone(),
                    current_level,
                });
                dispatch.log(
                    ActionRecord::new(player_id, "changeTool", Some(current_level), now_ms)
                        .with_field("tool", tool),
                );
                dispatch
            }
            ClientEvent::ChangeLevel(change) => {
                self.change_level(change, "changeLevel", ServerEvent::ChangeLevel, now_ms)
            }
            ClientEvent::ResetLevel(change) => {
                self.change_level(change, "resetLevel", ServerEvent::ResetLevel, now_ms)
            }
            ClientEvent::CompleteLevel {
                completed_level,
                player_id,
            } => self.complete_level(completed_level, player_id, now_ms),
            ClientEvent::GetCompletedLevels => reply(ServerEvent::CompletedLevelsResponse {
                levels: self.completed.all(),
            }),
            ClientEvent::ChangeTurn { next_player_id } => {
                self.turn.set(next_player_id);
                let mut dispatch = Dispatch::default();
                dispatch.send(Recipient::All, self.turn_update());
                dispatch
            }
            ClientEvent::GetTurn => reply(self.turn_update()),
            ClientEvent::GetNextCategory { .. } => {
                let category = self.pool.peek();
                reply(ServerEvent::NextCategoryResponse {
                    success: category.is_some(),
                    category,
                })
            }
        }
    }

    fn draw_shape(&mut self, shape: ShapeStroke, now_ms: u64) -> Dispatch {
        let mut dispatch = Dispatch::default();
        dispatch.log(
            ActionRecord::new(
                shape.player_id.clone(),
                "drawShape",
                Some(shape.current_level),
                now_ms,
            )
            .with_field("customId", &shape.custom_id)
            .with_field("points", shape.points.len()),
        );
        dispatch.send(Recipient::All, ServerEvent::DrawShape(shape));
        dispatch
    }

    /// Resolves the pin's collision filter and announces it to everyone
    fn draw_pin(&mut self, pin: PinRequest, now_ms: u64) -> Dispatch {
        let registration = match self.register(&pin, "drawPin") {
            Ok(registration) => registration,
            Err(dispatch) => return dispatch,
        };
        let assignment = registration.assignment();

        let mut dispatch = Dispatch::default();
        let mut record = ActionRecord::new(
            pin.player_id.clone(),
            "drawPin",
            Some(pin.current_level),
            now_ms,
        )
        .with_field("customId", &pin.custom_id)
        .with_field("nailCategory", assignment.category)
        .with_field("nailGroupNumber", assignment.group);
        if let Some(target) = &pin.target_body_custom_id {
            record = record.with_field("targetBodyCustomId", target);
        }
        dispatch.log(record);
        dispatch.send(
            Recipient::All,
            ServerEvent::DrawPin(ResolvedPin::resolve(
                pin,
                assignment.category,
                assignment.group,
            )),
        );
        dispatch
    }

    fn register_pin(&mut self, pin: PinRequest) -> Dispatch {
        match self.register(&pin, "registerPin") {
            Ok(_) => Dispatch::default(),
            Err(dispatch) => dispatch,
        }
    }

    fn register(
        &mut self,
        pin: &PinRequest,
        event_name: &str,
    ) -> Result<Registration, Dispatch> {
        let request = NailSpec {
            id: pin.custom_id.clone(),
            center: pin.center,
            radius: pin.radius,
            target_body: pin.target_body_custom_id.clone(),
            category: pin.nail_category,
            group: pin.nail_group_number,
        };

        match self.nails.register_or_create(&mut self.pool, request) {
            Ok(registration) => {
                let assignment = registration.assignment();
                if registration.is_created() {
                    debug!(
                        "Nail {} assigned category {:#06x}, group {}",
                        pin.custom_id, assignment.category, assignment.group
                    );
                } else {
                    debug!("Nail {} already registered", pin.custom_id);
                }
                Ok(registration)
            }
            Err(e) => {
                warn!("Cannot register nail {}: {}", pin.custom_id, e);
                Err(Dispatch::error(event_name, e))
            }
        }
    }

    fn create_chain(&mut self, chain: ChainLink, now_ms: u64) -> Dispatch {
        let mut dispatch = Dispatch::default();
        dispatch.log(
            ActionRecord::new(
                chain.player_id.clone(),
                "createChain",
                Some(chain.current_level),
                now_ms,
            )
            .with_field("pinAId", &chain.pin_a_id)
            .with_field("pinBId", &chain.pin_b_id)
            .with_field("stiffness", chain.stiffness)
            .with_field("damping", chain.damping)
            .with_field("length", chain.length),
        );
        dispatch.send(Recipient::All, ServerEvent::CreateChain(chain));
        dispatch
    }

    /// Removes the nail, if any. The category it held stays out of the pool.
    fn erase(
        &mut self,
        custom_id: String,
        player_id: String,
        current_level: LevelId,
        is_fall: bool,
        now_ms: u64,
    ) -> Dispatch {
        let removed = self.nails.remove(&custom_id).is_some();

        let mut dispatch = Dispatch::default();
        dispatch.log(
            ActionRecord::new(
                player_id.clone(),
                if is_fall { "fall" } else { "erase" },
                Some(current_level),
                now_ms,
            )
            .with_field("customId", &custom_id)
            .with_field("wasNail", removed),
        );
        dispatch.send(
            Recipient::All,
            ServerEvent::Erase {
                custom_id,
                player_id,
                current_level,
                is_fall,
            },
        );
        dispatch
    }

    fn push(
        &mut self,
        force: Vec2,
        player_id: String,
        current_level: LevelId,
        now_ms: u64,
    ) -> Dispatch {
        let mut dispatch = Dispatch::default();

        match self
            .push_gate
            .try_push(current_level, now_ms, &mut self.turn)
        {
            PushOutcome::Accepted { next_turn, locked } => {
                if locked {
                    info!("Push on level {} used; level is now locked", current_level);
                }
                dispatch.send(
                    Recipient::All,
                    ServerEvent::Push {
                        force,
                        player_id,
                        current_level,
                    },
                );
                dispatch.send(
                    Recipient::All,
                    ServerEvent::UpdateTurn {
                        current_turn: next_turn,
                    },
                );
            }
            PushOutcome::Rejected(reason) => {
                debug!("Push from {} rejected: {:?}", player_id, reason);
                if let PushRejection::Locked { .. } = reason {
                    dispatch.log(ActionRecord::new(
                        player_id,
                        "pushLocked",
                        Some(current_level),
                        now_ms,
                    ));
                }
                dispatch.send(Recipient::Sender, ServerEvent::PushRejected { reason });
            }
        }

        dispatch
    }

    fn change_level(
        &mut self,
        change: LevelChange,
        action_type: &'static str,
        announce: fn(LevelChange) -> ServerEvent,
        now_ms: u64,
    ) -> Dispatch {
        self.reset_level_state();
        info!(
            "{} to level {} by {} (was {})",
            action_type, change.level, change.player_id, change.current_level
        );

        let mut dispatch = Dispatch::default();
        let mut record = ActionRecord::new(
            change.player_id.clone(),
            action_type,
            Some(change.current_level),
            now_ms,
        )
        .with_field("level", change.level);
        if let Some(direction) = &change.direction {
            record = record.with_field("direction", direction);
        }
        dispatch.log(record);
        dispatch.send(Recipient::All, announce(change));
        dispatch
    }

    fn complete_level(&mut self, level: LevelId, player_id: String, now_ms: u64) -> Dispatch {
        if self.completed.complete(level) {
            info!("Level {} completed", level);
        }

        let mut dispatch = Dispatch::default();
        dispatch.log(ActionRecord::new(
            player_id.clone(),
            "completeLevel",
            Some(level),
            now_ms,
        ));
        dispatch.send(
            Recipient::All,
            ServerEvent::CompleteLevel {
                completed_level: level,
                player_id,
            },
        );
        dispatch.send(
            Recipient::All,
            ServerEvent::CompletedLevelsUpdated {
                levels: self.completed.all(),
            },
        );
        dispatch
    }

    /// Clears level-scoped state. Turn, completed levels and the group
    /// counter carry over.
    fn reset_level_state(&mut self) {
        self.nails.clear();
        self.pool.reset(&self.config.categories);
        self.push_gate.clear_lock();
    }

    fn turn_update(&self) -> ServerEvent {
        ServerEvent::UpdateTurn {
            current_turn: self.turn.current().to_string(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn pool(&self) -> &CategoryPool {
        &self.pool
    }

    pub fn nails(&self) -> &NailRegistry {
        &self.nails
    }

    pub fn turn(&self) -> &TurnState {
        &self.turn
    }

    pub fn push_gate(&self) -> &PushGate {
        &self.push_gate
    }

    pub fn completed_levels(&self) -> &CompletedLevels {
        &self.completed
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

fn relay(event: ServerEvent) -> Dispatch {
    let mut dispatch = Dispatch::default();
    dispatch.send(Recipient::Others, event);
    dispatch
}

fn reply(event: ServerEvent) -> Dispatch {
    let mut dispatch = Dispatch::default();
    dispatch.send(Recipient::Sender, event);
    dispatch
}
