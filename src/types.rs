/// Shared primitive types: compass directions, quantized position keys,
/// agent identifiers.
///
/// Positions are `Vec2` world coordinates (tiles); identity keys used by the
/// snapshot layer quantize to 1/256th of a tile so they are exact, ordered
/// and serializable.
use bevy::math::{IVec2, Vec2};
use serde::{Deserialize, Serialize};

/// Stable identifier for an agent actor. Entity handles are live references;
/// everything durable is keyed by this id instead.
pub type AgentId = u32;

/// Eight-way compass direction used for walking commands.
///
/// Octants follow the math convention (y up): 0 = East, counter-clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    #[serde(rename = "n")]
    North,
    #[serde(rename = "ne")]
    NorthEast,
    #[serde(rename = "e")]
    East,
    #[serde(rename = "se")]
    SouthEast,
    #[serde(rename = "s")]
    South,
    #[serde(rename = "sw")]
    SouthWest,
    #[serde(rename = "w")]
    West,
    #[serde(rename = "nw")]
    NorthWest,
}

impl Direction {
    /// Octant index 0..8, 0 = East, counter-clockwise.
    pub fn octant(self) -> u8 {
        match self {
            Direction::East => 0,
            Direction::NorthEast => 1,
            Direction::North => 2,
            Direction::NorthWest => 3,
            Direction::West => 4,
            Direction::SouthWest => 5,
            Direction::South => 6,
            Direction::SouthEast => 7,
        }
    }

    pub fn from_octant(octant: u8) -> Self {
        match octant % 8 {
            0 => Direction::East,
            1 => Direction::NorthEast,
            2 => Direction::North,
            3 => Direction::NorthWest,
            4 => Direction::West,
            5 => Direction::SouthWest,
            6 => Direction::South,
            _ => Direction::SouthEast,
        }
    }

    /// Unit displacement for one tick of walking in this direction.
    pub fn unit(self) -> Vec2 {
        const DIAG: f32 = std::f32::consts::FRAC_1_SQRT_2;
        match self {
            Direction::East => Vec2::new(1.0, 0.0),
            Direction::NorthEast => Vec2::new(DIAG, DIAG),
            Direction::North => Vec2::new(0.0, 1.0),
            Direction::NorthWest => Vec2::new(-DIAG, DIAG),
            Direction::West => Vec2::new(-1.0, 0.0),
            Direction::SouthWest => Vec2::new(-DIAG, -DIAG),
            Direction::South => Vec2::new(0.0, -1.0),
            Direction::SouthEast => Vec2::new(DIAG, -DIAG),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "n" | "north" => Some(Direction::North),
            "ne" | "northeast" => Some(Direction::NorthEast),
            "e" | "east" => Some(Direction::East),
            "se" | "southeast" => Some(Direction::SouthEast),
            "s" | "south" => Some(Direction::South),
            "sw" | "southwest" => Some(Direction::SouthWest),
            "w" | "west" => Some(Direction::West),
            "nw" | "northwest" => Some(Direction::NorthWest),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::North => "n",
            Direction::NorthEast => "ne",
            Direction::East => "e",
            Direction::SouthEast => "se",
            Direction::South => "s",
            Direction::SouthWest => "sw",
            Direction::West => "w",
            Direction::NorthWest => "nw",
        }
    }
}

/// Quantized world position used as half of the snapshot row identity
/// `(position, entity_name)`. Resolution is 1/256th of a tile, matching the
/// engine's own position granularity, so round-tripping through a key is
/// lossless for every position the engine can produce.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PosKey {
    pub x: i32,
    pub y: i32,
}

impl PosKey {
    pub fn from_vec2(pos: Vec2) -> Self {
        Self {
            x: (pos.x * 256.0).round() as i32,
            y: (pos.y * 256.0).round() as i32,
        }
    }

    pub fn to_vec2(self) -> Vec2 {
        Vec2::new(self.x as f32 / 256.0, self.y as f32 / 256.0)
    }
}

/// Tile containing a world position.
pub fn tile_of(pos: Vec2) -> IVec2 {
    IVec2::new(pos.x.floor() as i32, pos.y.floor() as i32)
}

/// Center of a tile, where path waypoints live.
pub fn tile_center(tile: IVec2) -> Vec2 {
    Vec2::new(tile.x as f32 + 0.5, tile.y as f32 + 0.5)
}
