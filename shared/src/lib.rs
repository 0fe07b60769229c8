//! Wire protocol shared by the session server and its clients.
//!
//! Every datagram is a `bincode`-encoded [`Packet`]. Connection management
//! packets wrap the game traffic, which travels as [`ClientEvent`] (inbound)
//! and [`ServerEvent`] (outbound).

use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;

/// Largest payload a single UDP datagram can carry.
pub const MAX_PACKET_SIZE: usize = 65_507;

/// Minimum time between two accepted pushes.
pub const PUSH_COOLDOWN_MS: u64 = 6000;

/// Level whose first accepted push locks pushing for the rest of the level.
pub const LOCKED_PUSH_LEVEL: u32 = 7;

pub const PLAYER_ONE: &str = "player1";
pub const PLAYER_TWO: &str = "player2";

/// Collision category bitmask handed to the physics engine.
pub type Category = u16;

/// Collision group number. Server-assigned groups are always negative.
pub type GroupNumber = i32;

pub type LevelId = u32;

/// The 15 collision categories available to nails, lowest bit first.
/// `0x0001` is the physics engine's default category and is never handed out.
pub const CATEGORY_UNIVERSE: [Category; 15] = [
    0x0002, 0x0004, 0x0008, 0x0010, 0x0020, 0x0040, 0x0080, 0x0100, 0x0200, 0x0400, 0x0800,
    0x1000, 0x2000, 0x4000, 0x8000,
];

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    Heartbeat,
    Event(ClientEvent),
    Disconnect,

    Connected {
        client_id: u32,
    },
    Update(ServerEvent),
    Disconnected {
        reason: String,
    },
}

/// A freehand shape drawn by a player.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ShapeStroke {
    pub points: Vec<Vec2>,
    pub player_id: String,
    pub custom_id: String,
    pub current_level: LevelId,
}

/// A pin as requested by a client. Category and group are optional overrides;
/// the server fills in whatever is missing.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PinRequest {
    pub center: Vec2,
    pub radius: f32,
    pub points: Vec<Vec2>,
    pub player_id: String,
    pub custom_id: String,
    pub current_level: LevelId,
    pub target_body_custom_id: Option<String>,
    pub nail_group_number: Option<GroupNumber>,
    pub nail_category: Option<Category>,
}

/// A pin after the server resolved its collision filter.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ResolvedPin {
    pub center: Vec2,
    pub radius: f32,
    pub points: Vec<Vec2>,
    pub player_id: String,
    pub custom_id: String,
    pub current_level: LevelId,
    pub target_body_custom_id: Option<String>,
    pub nail_group_number: GroupNumber,
    pub nail_category: Category,
}

impl ResolvedPin {
    pub fn resolve(request: PinRequest, category: Category, group: GroupNumber) -> Self {
        Self {
            center: request.center,
            radius: request.radius,
            points: request.points,
            player_id: request.player_id,
            custom_id: request.custom_id,
            current_level: request.current_level,
            target_body_custom_id: request.target_body_custom_id,
            nail_group_number: group,
            nail_category: category,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChainLink {
    pub pin_a_id: String,
    pub pin_b_id: String,
    pub stiffness: f32,
    pub damping: f32,
    pub length: f32,
    pub player_id: String,
    pub current_level: LevelId,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LevelChange {
    pub level: LevelId,
    pub current_level: LevelId,
    pub direction: Option<String>,
    pub player_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum PushRejection {
    /// The level's single push has already been used.
    Locked { level: LevelId },
    /// Another push was accepted less than the cooldown ago.
    Cooldown { remaining_ms: u64 },
}

/// Events a client sends to the server.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum ClientEvent {
    MouseMove {
        x: f32,
        y: f32,
        player_id: String,
    },
    DrawShape(ShapeStroke),
    DrawPin(PinRequest),
    RegisterPin(PinRequest),
    CreateChain(ChainLink),
    ChangeHingePosition {
        level: LevelId,
        hinge_pos_index: u8,
        player_id: String,
    },
    ReleaseCategory {
        category: Option<Category>,
        player_id: String,
        current_level: LevelId,
    },
    Erase {
        custom_id: String,
        player_id: String,
        current_level: LevelId,
        is_fall: bool,
    },
    Push {
        force: Vec2,
        player_id: String,
        current_level: LevelId,
    },
    ChangeTool {
        tool: String,
        player_id: String,
        current_level: LevelId,
    },
    ChangeLevel(LevelChange),
    ResetLevel(LevelChange),
    CompleteLevel {
        completed_level: LevelId,
        player_id: String,
    },
    GetCompletedLevels,
    ChangeTurn {
        next_player_id: String,
    },
    GetTurn,
    GetNextCategory {
        player_id: String,
        current_level: LevelId,
    },
}

impl ClientEvent {
    /// Event name as the browser client knows it.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::MouseMove { .. } => "mouseMove",
            ClientEvent::DrawShape(_) => "drawShape",
            ClientEvent::DrawPin(_) => "drawPin",
            ClientEvent::RegisterPin(_) => "registerPin",
            ClientEvent::CreateChain(_) => "createChain",
            ClientEvent::ChangeHingePosition { .. } => "changeHingePosition",
            ClientEvent::ReleaseCategory { .. } => "releaseCategory",
            ClientEvent::Erase { .. } => "erase",
            ClientEvent::Push { .. } => "push",
            ClientEvent::ChangeTool { .. } => "changeTool",
            ClientEvent::ChangeLevel(_) => "changeLevel",
            ClientEvent::ResetLevel(_) => "resetLevel",
            ClientEvent::CompleteLevel { .. } => "completeLevel",
            ClientEvent::GetCompletedLevels => "getCompletedLevels",
            ClientEvent::ChangeTurn { .. } => "changeTurn",
            ClientEvent::GetTurn => "getTurn",
            ClientEvent::GetNextCategory { .. } => "getNextCategory",
        }
    }
}

/// Events the server sends to clients.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum ServerEvent {
    MouseMove {
        x: f32,
        y: f32,
        player_id: String,
    },
    DrawShape(ShapeStroke),
    DrawPin(ResolvedPin),
    CreateChain(ChainLink),
    ChangeHingePosition {
        level: LevelId,
        hinge_pos_index: u8,
        player_id: String,
    },
    Erase {
        custom_id: String,
        player_id: String,
        current_level: LevelId,
        is_fall: bool,
    },
    Push {
        force: Vec2,
        player_id: String,
        current_level: LevelId,
    },
    ChangeTool {
        tool: String,
        player_id: String,
        current_level: LevelId,
    },
    ChangeLevel(LevelChange),
    ResetLevel(LevelChange),
    CompleteLevel {
        completed_level: LevelId,
        player_id: String,
    },
    CompletedLevelsUpdated {
        levels: Vec<LevelId>,
    },
    CompletedLevelsResponse {
        levels: Vec<LevelId>,
    },
    UpdateTurn {
        current_turn: String,
    },
    NextCategoryResponse {
        success: bool,
        category: Option<Category>,
    },
    PushRejected {
        reason: PushRejection,
    },
    Error {
        event: String,
        message: String,
    },
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::MouseMove { .. } => "mouseMove",
            ServerEvent::DrawShape(_) => "drawShape",
            ServerEvent::DrawPin(_) => "drawPin",
            ServerEvent::CreateChain(_) => "createChain",
            ServerEvent::ChangeHingePosition { .. } => "changeHingePosition",
            ServerEvent::Erase { .. } => "erase",
            ServerEvent::Push { .. } => "push",
            ServerEvent::ChangeTool { .. } => "changeTool",
            ServerEvent::ChangeLevel(_) => "changeLevel",
            ServerEvent::ResetLevel(_) => "resetLevel",
            ServerEvent::CompleteLevel { .. } => "completeLevel",
            ServerEvent::CompletedLevelsUpdated { .. } => "completedLevelsUpdated",
            ServerEvent::CompletedLevelsResponse { .. } => "completedLevelsResponse",
            ServerEvent::UpdateTurn { .. } => "updateTurn",
            ServerEvent::NextCategoryResponse { .. } => "nextCategoryResponse",
            ServerEvent::PushRejected { .. } => "pushRejected",
            ServerEvent::Error { .. } => "error",
        }
    }
}
