use serde::{Deserialize, Serialize};

/// Integer world-space voxel position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    #[inline]
    pub fn up(self) -> Self {
        self.offset(0, 1, 0)
    }

    #[inline]
    pub fn down(self) -> Self {
        self.offset(0, -1, 0)
    }

    /// The six face-adjacent positions in +Y, -Y, +X, -X, +Z, -Z order.
    #[inline]
    pub fn neighbors(self) -> [BlockPos; 6] {
        [
            self.offset(0, 1, 0),
            self.offset(0, -1, 0),
            self.offset(1, 0, 0),
            self.offset(-1, 0, 0),
            self.offset(0, 0, 1),
            self.offset(0, 0, -1),
        ]
    }

    #[inline]
    pub fn manhattan(self, other: BlockPos) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs() + (self.z - other.z).abs()
    }
}

impl From<(i32, i32, i32)> for BlockPos {
    fn from(value: (i32, i32, i32)) -> Self {
        Self::new(value.0, value.1, value.2)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub cx: i32,
    pub cy: i32,
    pub cz: i32,
}

impl ChunkCoord {
    #[inline]
    pub const fn new(cx: i32, cy: i32, cz: i32) -> Self {
        Self { cx, cy, cz }
    }

    #[inline]
    pub fn with_y(self, cy: i32) -> Self {
        Self { cy, ..self }
    }

    #[inline]
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            cx: self.cx + dx,
            cy: self.cy + dy,
            cz: self.cz + dz,
        }
    }

    /// Squared distance on the XZ plane, in chunk units.
    #[inline]
    pub fn horizontal_distance_sq(self, other: ChunkCoord) -> i64 {
        let dx = i64::from(self.cx - other.cx);
        let dz = i64::from(self.cz - other.cz);
        dx * dx + dz * dz
    }

    /// World position of local voxel `(0,0,0)`.
    #[inline]
    pub fn origin(self, dims: ChunkDims) -> BlockPos {
        BlockPos::new(
            self.cx * dims.sx as i32,
            self.cy * dims.sy as i32,
            self.cz * dims.sz as i32,
        )
    }
}

impl From<(i32, i32, i32)> for ChunkCoord {
    fn from(value: (i32, i32, i32)) -> Self {
        Self::new(value.0, value.1, value.2)
    }
}

impl From<ChunkCoord> for (i32, i32, i32) {
    fn from(value: ChunkCoord) -> Self {
        (value.cx, value.cy, value.cz)
    }
}

/// Voxel position inside a chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LocalPos {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

/// Chunk extent: `sx = sz = S` horizontally, `sy = H` vertically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkDims {
    pub sx: usize,
    pub sy: usize,
    pub sz: usize,
}

impl Default for ChunkDims {
    fn default() -> Self {
        Self::new(16, 64)
    }
}

impl ChunkDims {
    #[inline]
    pub const fn new(horizontal: usize, vertical: usize) -> Self {
        Self {
            sx: horizontal,
            sy: vertical,
            sz: horizontal,
        }
    }

    #[inline]
    pub const fn volume(&self) -> usize {
        self.sx * self.sy * self.sz
    }

    #[inline]
    pub const fn columns(&self) -> usize {
        self.sx * self.sz
    }

    /// Chunk containing a world position (floor division on every axis).
    #[inline]
    pub fn chunk_of(&self, pos: BlockPos) -> ChunkCoord {
        ChunkCoord::new(
            pos.x.div_euclid(self.sx as i32),
            pos.y.div_euclid(self.sy as i32),
            pos.z.div_euclid(self.sz as i32),
        )
    }

    #[inline]
    pub fn local_of(&self, pos: BlockPos) -> LocalPos {
        LocalPos {
            x: pos.x.rem_euclid(self.sx as i32) as usize,
            y: pos.y.rem_euclid(self.sy as i32) as usize,
            z: pos.z.rem_euclid(self.sz as i32) as usize,
        }
    }

    #[inline]
    pub fn split(&self, pos: BlockPos) -> (ChunkCoord, LocalPos) {
        (self.chunk_of(pos), self.local_of(pos))
    }

    #[inline]
    pub fn to_world(&self, coord: ChunkCoord, local: LocalPos) -> BlockPos {
        coord
            .origin(*self)
            .offset(local.x as i32, local.y as i32, local.z as i32)
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        (y * self.sz + z) * self.sx + x
    }

    #[inline]
    pub fn column_index(&self, x: usize, z: usize) -> usize {
        z * self.sx + x
    }

    #[inline]
    pub fn contains_local(&self, x: i32, y: i32, z: i32) -> bool {
        x >= 0
            && y >= 0
            && z >= 0
            && (x as usize) < self.sx
            && (y as usize) < self.sy
            && (z as usize) < self.sz
    }
}
