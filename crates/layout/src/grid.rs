use glam::Vec2;
use mapgraph_catalog::RegionType;
use std::collections::HashMap;

/// Bucket coordinate in an [`ExclusionGrid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellCoord {
    pub x: i32,
    pub y: i32,
}

impl CellCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Compute the valid spawn cells of a node.
///
/// Walks the node area in unit steps and snaps each step to its cell center
/// (`floor + 0.5`). A cell is kept when it lies in a spawn zone (or the region
/// declares none) and in no obstacle. Zones and obstacles are node-local.
pub fn spawn_cells(origin: Vec2, region: &RegionType) -> Vec<Vec2> {
    let min = origin - region.area / 2.0;
    let columns = region.area.x.ceil().max(0.0) as i32;
    let rows = region.area.y.ceil().max(0.0) as i32;

    let mut cells = Vec::with_capacity((columns * rows).max(0) as usize);
    for i in 0..columns {
        for j in 0..rows {
            let x = min.x + i as f32;
            let y = min.y + j as f32;
            let cell = Vec2::new(x.floor() + 0.5, y.floor() + 0.5);
            let local = cell - origin;
            let in_zone =
                region.spawn_zones.is_empty() || region.spawn_zones.iter().any(|z| z.contains(local));
            let blocked = region.obstacles.iter().any(|o| o.contains(local));
            if in_zone && !blocked {
                cells.push(cell);
            }
        }
    }
    cells
}

/// Spatial hash of placed positions for the minimum-separation test.
///
/// Buckets are one separation radius wide, so a conflicting neighbor can only
/// sit in the 3x3 block around the candidate's bucket.
#[derive(Debug)]
pub struct ExclusionGrid {
    radius: f32,
    bucket: f32,
    buckets: HashMap<CellCoord, Vec<Vec2>>,
    len: usize,
}

impl ExclusionGrid {
    pub fn new(radius: f32) -> Self {
        let bucket = if radius > 0.0 { radius } else { 1.0 };
        Self {
            radius,
            bucket,
            buckets: HashMap::new(),
            len: 0,
        }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    fn bucket_of(&self, p: Vec2) -> CellCoord {
        CellCoord {
            x: (p.x / self.bucket).floor() as i32,
            y: (p.y / self.bucket).floor() as i32,
        }
    }

    pub fn insert(&mut self, p: Vec2) {
        let coord = self.bucket_of(p);
        self.buckets.entry(coord).or_default().push(p);
        self.len += 1;
    }

    /// True when some placed position is strictly closer than the radius.
    pub fn too_close(&self, p: Vec2) -> bool {
        let center = self.bucket_of(p);
        for dx in -1..=1 {
            for dy in -1..=1 {
                let coord = CellCoord::new(center.x + dx, center.y + dy);
                if let Some(points) = self.buckets.get(&coord) {
                    if points.iter().any(|q| q.distance(p) < self.radius) {
                        return true;
                    }
                }
            }
        }
        false
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
