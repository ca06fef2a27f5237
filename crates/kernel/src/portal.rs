use mapgraph_common::{Direction, NodeIndex};

/// Whether a portal entry goes deeper or backs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    Forward,
    Return,
}

/// Remembers the last portal direction the player walked through and
/// classifies the next entry against it.
#[derive(Debug, Clone, Default)]
pub struct PortalResolver {
    last_entered: Option<Direction>,
}

impl PortalResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify an entry through `entered` while standing in `current`.
    ///
    /// From home every entry is forward. Elsewhere, walking back through the
    /// side you arrived from (the opposite of the previous entry) is a return.
    /// With nothing remembered the previous entry counts as North.
    pub fn classify(&self, current: NodeIndex, entered: Direction) -> Traversal {
        if current.is_home() {
            return Traversal::Forward;
        }
        let last = self.last_entered.unwrap_or(Direction::North);
        if entered == last.opposite() {
            Traversal::Return
        } else {
            Traversal::Forward
        }
    }

    /// Remember `entered` as the last direction walked through.
    pub fn record(&mut self, entered: Direction) {
        self.last_entered = Some(entered);
    }

    pub fn last_entered(&self) -> Option<Direction> {
        self.last_entered
    }

    /// Flip the remembered direction after stepping back through history.
    pub fn invert_last(&mut self) {
        self.last_entered = self.last_entered.map(Direction::opposite);
    }

    pub fn clear(&mut self) {
        self.last_entered = None;
    }
}
