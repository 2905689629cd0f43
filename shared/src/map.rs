//! World geometry: the boundary polygon and the biome rectangles.

use serde::{Deserialize, Serialize};

/// Height of the sea surface crates are dropped on.
pub const SEA_LEVEL: f64 = 300.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Biome {
    Recovery,
    Water,
    Air,
}

/// Axis-aligned biome rectangle, bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiomeZone {
    pub biome: Biome,
    pub x1: f64,
    pub x2: f64,
    pub y1: f64,
    pub y2: f64,
}

impl BiomeZone {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.x1 <= x && x <= self.x2 && self.y1 <= y && y <= self.y2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolygonKind {
    /// Objects must stay inside.
    Boundary,
    /// Objects must stay outside and clear of the edges.
    Solid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub kind: PolygonKind,
    pub vertices: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapObject {
    pub size_x: f64,
    pub sky_height: f64,
    pub ocean_depth: f64,
    pub width: f64,
    pub height: f64,
    pub background: (u8, u8, u8),
    pub polygons: Vec<Polygon>,
    /// Checked in order; the first match wins.
    pub biomes: Vec<BiomeZone>,
}

impl Default for MapObject {
    fn default() -> Self {
        Self::new()
    }
}

impl MapObject {
    pub fn new() -> Self {
        let size_x = 20000.0;
        let sky_height = 5000.0;
        let ocean_depth = 2000.0;

        let boundary = Polygon {
            kind: PolygonKind::Boundary,
            vertices: vec![
                Point { x: -size_x, y: -sky_height },
                Point { x: -size_x, y: ocean_depth },
                Point { x: size_x, y: ocean_depth },
                Point { x: size_x, y: -sky_height },
            ],
        };

        let biomes = vec![
            BiomeZone {
                biome: Biome::Recovery,
                x1: -400.0,
                x2: 400.0,
                y1: -200.0,
                y2: 200.0,
            },
            BiomeZone {
                biome: Biome::Water,
                x1: -size_x,
                x2: size_x,
                y1: 310.0,
                y2: ocean_depth,
            },
            BiomeZone {
                biome: Biome::Air,
                x1: -size_x,
                x2: size_x,
                y1: -sky_height,
                y2: 310.0,
            },
        ];

        Self {
            size_x,
            sky_height,
            ocean_depth,
            width: size_x * 2.0,
            height: sky_height + ocean_depth,
            background: (0, 165, 255),
            polygons: vec![boundary],
            biomes,
        }
    }

    /// Returns the biome at a point; anything outside every rectangle is air.
    pub fn classify(&self, x: f64, y: f64) -> Biome {
        self.biomes
            .iter()
            .find(|zone| zone.contains(x, y))
            .map(|zone| zone.biome)
            .unwrap_or(Biome::Air)
    }

    /// The first recovery rectangle. Every map has one.
    pub fn recovery(&self) -> BiomeZone {
        self.biomes
            .iter()
            .find(|zone| zone.biome == Biome::Recovery)
            .copied()
            .unwrap_or(BiomeZone {
                biome: Biome::Recovery,
                x1: 0.0,
                x2: 0.0,
                y1: 0.0,
                y2: 0.0,
            })
    }

    /// Tests a move on each axis separately, returning `(blocked_x, blocked_y)`.
    pub fn check_collisions(
        &self,
        size: f64,
        x: f64,
        y: f64,
        next_x: f64,
        next_y: f64,
    ) -> (bool, bool) {
        (
            self.collides_at(size, next_x, y),
            self.collides_at(size, x, next_y),
        )
    }

    pub fn collides_at(&self, size: f64, px: f64, py: f64) -> bool {
        let threshold = size / 2.0;

        for polygon in &self.polygons {
            match polygon.kind {
                PolygonKind::Boundary => {
                    if !point_in_polygon(px, py, &polygon.vertices) {
                        return true;
                    }
                }
                PolygonKind::Solid => {
                    if point_in_polygon(px, py, &polygon.vertices) {
                        return true;
                    }
                    let n = polygon.vertices.len();
                    for i in 0..n {
                        let a = polygon.vertices[i];
                        let b = polygon.vertices[(i + 1) % n];
                        if distance_to_edge(px, py, a, b) <= threshold {
                            return true;
                        }
                    }
                }
            }
        }
        false
    }
}

/// Even-odd ray casting test.
pub fn point_in_polygon(px: f64, py: f64, vertices: &[Point]) -> bool {
    let mut inside = false;
    let n = vertices.len();
    if n == 0 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (vertices[i].x, vertices[i].y);
        let (xj, yj) = (vertices[j].x, vertices[j].y);
        let crosses = (yi > py) != (yj > py) && px < (xj - xi) * (py - yi) / (yj - yi) + xi;
        if crosses {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Distance from a point to the segment `a`-`b`.
pub fn distance_to_edge(px: f64, py: f64, a: Point, b: Point) -> f64 {
    let len_sq = (b.x - a.x).powi(2) + (b.y - a.y).powi(2);
    if len_sq == 0.0 {
        return (px - a.x).hypot(py - a.y);
    }
    let t = (((px - a.x) * (b.x - a.x) + (py - a.y) * (b.y - a.y)) / len_sq).clamp(0.0, 1.0);
    let proj_x = a.x + t * (b.x - a.x);
    let proj_y = a.y + t * (b.y - a.y);
    (px - proj_x).hypot(py - proj_y)
}
