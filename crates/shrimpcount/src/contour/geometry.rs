/// Axis-aligned inclusive bounding box in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

impl BoundingBox {
    /// Exclusive right edge.
    pub fn right(&self) -> i32 {
        self.x + self.w as i32
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i32 {
        self.y + self.h as i32
    }
}

/// Zeroth and first area moments of a closed polygon (Green's theorem).
///
/// Signs are normalised so `m00` is non-negative regardless of winding.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Moments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
}

impl Moments {
    /// `(m10 / m00, m01 / m00)`, or `None` for a degenerate polygon.
    pub fn centroid(&self) -> Option<[f64; 2]> {
        if self.m00 == 0.0 {
            return None;
        }
        Some([self.m10 / self.m00, self.m01 / self.m00])
    }
}

/// Unsigned shoelace area of a closed polygon.
pub fn polygon_area(points: &[[i32; 2]]) -> f64 {
    polygon_moments(points).m00
}

pub fn polygon_moments(points: &[[i32; 2]]) -> Moments {
    let n = points.len();
    if n < 3 {
        return Moments::default();
    }
    let mut a00 = 0.0f64;
    let mut a10 = 0.0f64;
    let mut a01 = 0.0f64;
    for i in 0..n {
        let [x0, y0] = points[i].map(f64::from);
        let [x1, y1] = points[(i + 1) % n].map(f64::from);
        let cross = x0 * y1 - x1 * y0;
        a00 += cross;
        a10 += cross * (x0 + x1);
        a01 += cross * (y0 + y1);
    }
    let mut m = Moments {
        m00: a00 / 2.0,
        m10: a10 / 6.0,
        m01: a01 / 6.0,
    };
    if m.m00 < 0.0 {
        m.m00 = -m.m00;
        m.m10 = -m.m10;
        m.m01 = -m.m01;
    }
    m
}

/// Tight inclusive box around `points`.
pub fn bounding_box(points: &[[i32; 2]]) -> Option<BoundingBox> {
    let first = points.first()?;
    let (mut x0, mut y0, mut x1, mut y1) = (first[0], first[1], first[0], first[1]);
    for p in &points[1..] {
        x0 = x0.min(p[0]);
        y0 = y0.min(p[1]);
        x1 = x1.max(p[0]);
        y1 = y1.max(p[1]);
    }
    Some(BoundingBox {
        x: x0,
        y: y0,
        w: (x1 - x0 + 1) as u32,
        h: (y1 - y0 + 1) as u32,
    })
}
