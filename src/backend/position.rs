use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Absolute(i32),
    Relative(i32),
    Local(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: Axis,
    pub y: Axis,
    pub z: Axis,
}

impl Position {
    pub fn relative(x: i32, y: i32, z: i32) -> Self {
        Self {
            x: Axis::Relative(x),
            y: Axis::Relative(y),
            z: Axis::Relative(z),
        }
    }
}

impl Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::Absolute(v) => write!(f, "{}", v),
            Axis::Relative(v) => write!(f, "~{}", v),
            Axis::Local(v) => write!(f, "^{}", v),
        }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axes_render_with_their_prefix() {
        let pos = Position {
            x: Axis::Absolute(10),
            y: Axis::Relative(-2),
            z: Axis::Local(0),
        };
        assert_eq!(pos.to_string(), "10 ~-2 ^0");
        assert_eq!(Position::relative(1, 0, 3).to_string(), "~1 ~0 ~3");
    }
}
