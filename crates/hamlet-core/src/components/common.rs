//! Common components used across multiple entity types.

use hecs::Entity;
use serde::{Deserialize, Serialize};

/// 2D position vector on the ground plane
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_squared(&self, other: &Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn distance(&self, other: &Self) -> f32 {
        self.distance_squared(other).sqrt()
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn normalize(&self) -> Self {
        let len = self.length();
        if len > 0.0 {
            Self {
                x: self.x / len,
                y: self.y / len,
            }
        } else {
            Self::ZERO
        }
    }

    pub fn dot(&self, other: &Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Counter-clockwise perpendicular
    pub fn perp_left(&self) -> Self {
        Self::new(-self.y, self.x)
    }

    /// Clockwise perpendicular
    pub fn perp_right(&self) -> Self {
        Self::new(self.y, -self.x)
    }

    /// Unit vector at `angle` radians from the +x axis
    pub fn from_angle(angle: f32) -> Self {
        Self::new(angle.cos(), angle.sin())
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Self;
    fn mul(self, scalar: f32) -> Self {
        Self {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }
}

/// Spatial position component - where an entity stands on the map.
///
/// `region` identifies a landmass; entities in different regions can only
/// reach each other by boat through paired docks.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub pos: Vec2,
    pub region: u16,
}

impl Position {
    pub fn new(x: f32, y: f32, region: u16) -> Self {
        Self {
            pos: Vec2::new(x, y),
            region,
        }
    }

    pub fn at(pos: Vec2, region: u16) -> Self {
        Self { pos, region }
    }
}

/// Local obstacle avoidance state carried while steering around a building
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Avoidance {
    /// Unit vector perpendicular to the heading when avoidance started
    pub direction: Vec2,
    /// Seconds left before steering fully returns to the target
    pub remaining: f32,
    /// The building being avoided
    pub obstacle: Entity,
}

/// Movement component - present only while entity is moving
#[derive(Debug, Clone)]
pub struct Movement {
    /// Where the entity is heading right now
    pub destination: Vec2,
    /// Movement speed in units per second
    pub speed: f32,
    /// Building the entity is walking into, never treated as an obstacle
    pub target_building: Option<Entity>,
    /// Dock to board on the way when the real target is in another region
    pub via_port: Option<Entity>,
    /// Seconds until the target is considered stale and dropped
    pub expires_in: f32,
    /// Seconds spent without making progress
    pub stuck_for: f32,
    /// Random waypoint taken after getting stuck, cleared on reaching it
    pub detour: Option<Vec2>,
    pub avoidance: Option<Avoidance>,
}

impl Movement {
    pub fn new(destination: Vec2, speed: f32, expires_in: f32) -> Self {
        Self {
            destination,
            speed,
            target_building: None,
            via_port: None,
            expires_in,
            stuck_for: 0.0,
            detour: None,
            avoidance: None,
        }
    }

    pub fn into_building(mut self, building: Entity) -> Self {
        self.target_building = Some(building);
        self
    }

    pub fn via_port(mut self, port: Option<Entity>) -> Self {
        self.via_port = port;
        self
    }
}

/// Name component for entities that have names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Name {
    pub given: String,
    pub family: String,
}

impl Name {
    pub fn new(given: impl Into<String>, family: impl Into<String>) -> Self {
        Self {
            given: given.into(),
            family: family.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.given, self.family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec2_operations() {
        let a = Vec2::new(1.0, 2.0);
        let b = Vec2::new(4.0, 6.0);

        let sum = a + b;
        assert_eq!(sum.x, 5.0);
        assert_eq!(sum.y, 8.0);

        let diff = b - a;
        assert_eq!(diff.x, 3.0);
        assert_eq!(a.distance(&b), 5.0);

        let scaled = a * 2.0;
        assert_eq!(scaled.y, 4.0);
    }

    #[test]
    fn test_vec2_normalize_and_perp() {
        let v = Vec2::new(3.0, 4.0);
        let n = v.normalize();
        assert!((n.length() - 1.0).abs() < 0.001);
        assert_eq!(Vec2::ZERO.normalize(), Vec2::ZERO);

        let left = n.perp_left();
        let right = n.perp_right();
        assert!(left.dot(&n).abs() < 0.001);
        assert!((left + right).length() < 0.001);
    }

    #[test]
    fn test_name() {
        let name = Name::new("Jeanne", "Morel");
        assert_eq!(name.full_name(), "Jeanne Morel");
    }
}
