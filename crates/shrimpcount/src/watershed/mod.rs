//! Marker-controlled region growing and the label map it produces.

mod grow;

pub use grow::{grow_regions, label_markers, watershed, Markers};

/// Per-pixel outcome of region growing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    /// Never reached by any growth front.
    Unassigned,
    /// Grown from the background marker.
    Background,
    /// Pixel where two different fronts met.
    Boundary,
    /// Grown from seed `id` (`id >= 2`).
    Region(u32),
}

impl Label {
    pub const RAW_BOUNDARY: i32 = -1;
    pub const RAW_UNASSIGNED: i32 = 0;
    pub const RAW_BACKGROUND: i32 = 1;

    /// Integer encoding: boundary −1, unassigned 0, background 1, regions ≥ 2.
    pub fn to_raw(self) -> i32 {
        match self {
            Label::Unassigned => Self::RAW_UNASSIGNED,
            Label::Background => Self::RAW_BACKGROUND,
            Label::Boundary => Self::RAW_BOUNDARY,
            Label::Region(id) => id as i32,
        }
    }

    pub fn from_raw(raw: i32) -> Self {
        match raw {
            r if r < 0 => Label::Boundary,
            0 => Label::Unassigned,
            1 => Label::Background,
            id => Label::Region(id as u32),
        }
    }

    pub fn region_id(self) -> Option<u32> {
        match self {
            Label::Region(id) => Some(id),
            _ => None,
        }
    }
}

/// Full-frame grid of [`Label`]s, same dimensions as the input frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    width: u32,
    height: u32,
    labels: Vec<Label>,
}

impl LabelMap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            labels: vec![Label::Unassigned; width as usize * height as usize],
        }
    }

    /// Decode a raw integer buffer (row-major).
    ///
    /// Returns `None` when `raw.len() != width * height`.
    pub fn from_raw(width: u32, height: u32, raw: &[i32]) -> Option<Self> {
        if raw.len() != width as usize * height as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            labels: raw.iter().map(|&r| Label::from_raw(r)).collect(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn get(&self, x: u32, y: u32) -> Label {
        self.labels[y as usize * self.width as usize + x as usize]
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn to_raw(&self) -> Vec<i32> {
        self.labels.iter().map(|l| l.to_raw()).collect()
    }

    /// Distinct region ids in ascending order.
    pub fn region_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.labels.iter().filter_map(|l| l.region_id()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn region_count(&self) -> usize {
        self.region_ids().len()
    }

    pub fn count(&self, label: Label) -> usize {
        self.labels.iter().filter(|&&l| l == label).count()
    }
}
