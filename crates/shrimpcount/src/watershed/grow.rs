//! Priority-flood watershed seeded by labelled markers.
//!
//! Growth cost between 4-neighbours is the largest per-channel absolute
//! colour difference. Pixels are expanded from 256 FIFO queues, lowest cost
//! first. A pixel whose labelled neighbours disagree becomes a boundary and
//! stops propagating, so ties never favour one marker over another.

use std::collections::VecDeque;

use image::{GrayImage, Luma, RgbImage};
use imageproc::region_labelling::{connected_components, Connectivity};

use super::{Label, LabelMap};
use crate::seeds::Seeds;

const IN_QUEUE: i32 = -2;
const WSHED: i32 = -1;
const N_LEVELS: usize = 256;

/// Raw marker grid: 0 unassigned, 1 background, ≥ 2 seeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    pub width: u32,
    pub height: u32,
    pub data: Vec<i32>,
    /// Number of seed components (ids `2..2 + seed_count`).
    pub seed_count: usize,
}

/// Label seed components and mark the unknown band as unassigned.
///
/// Components are 8-connected. Component ids are shifted by one so that
/// everything outside the seeds and the unknown band becomes background (1).
pub fn label_markers(sure_foreground: &GrayImage, unknown: &GrayImage) -> Markers {
    let (w, h) = sure_foreground.dimensions();
    let components = connected_components(sure_foreground, Connectivity::Eight, Luma([0u8]));

    let mut seed_count = 0usize;
    let data: Vec<i32> = components
        .iter()
        .zip(unknown.iter())
        .map(|(&c, &u)| {
            seed_count = seed_count.max(c as usize);
            if u != 0 {
                Label::RAW_UNASSIGNED
            } else {
                c as i32 + 1
            }
        })
        .collect();

    Markers {
        width: w,
        height: h,
        data,
        seed_count,
    }
}

#[inline]
fn color_diff(frame: &[u8], a: usize, b: usize) -> usize {
    let pa = &frame[a * 3..a * 3 + 3];
    let pb = &frame[b * 3..b * 3 + 3];
    let mut d = 0u8;
    for c in 0..3 {
        d = d.max(pa[c].abs_diff(pb[c]));
    }
    d as usize
}

/// 4-neighbours of `idx` in left, right, up, down order.
#[inline]
fn neighbours(idx: usize, w: usize, h: usize) -> impl Iterator<Item = usize> {
    let x = idx % w;
    let y = idx / w;
    [
        (x > 0).then(|| idx - 1),
        (x + 1 < w).then(|| idx + 1),
        (y > 0).then(|| idx - w),
        (y + 1 < h).then(|| idx + w),
    ]
    .into_iter()
    .flatten()
}

/// Flood `markers` over `frame`.
///
/// Returns `None` when the marker grid does not cover the frame exactly.
pub fn watershed(frame: &RgbImage, markers: Markers) -> Option<LabelMap> {
    let (w, h) = (markers.width as usize, markers.height as usize);
    if frame.dimensions() != (markers.width, markers.height) || markers.data.len() != w * h {
        return None;
    }
    let px = frame.as_raw();
    let mut m = markers.data;

    let mut queues: Vec<VecDeque<usize>> = (0..N_LEVELS).map(|_| VecDeque::new()).collect();
    let mut active = N_LEVELS;

    for idx in 0..w * h {
        if m[idx] != 0 {
            continue;
        }
        let mut best = N_LEVELS;
        for n in neighbours(idx, w, h) {
            if m[n] > 0 {
                best = best.min(color_diff(px, idx, n));
            }
        }
        if best < N_LEVELS {
            queues[best].push_back(idx);
            active = active.min(best);
            m[idx] = IN_QUEUE;
        }
    }

    loop {
        while active < N_LEVELS && queues[active].is_empty() {
            active += 1;
        }
        if active == N_LEVELS {
            break;
        }
        let Some(idx) = queues[active].pop_front() else {
            continue;
        };

        let mut lab = 0i32;
        for n in neighbours(idx, w, h) {
            let t = m[n];
            if t > 0 {
                if lab == 0 {
                    lab = t;
                } else if t != lab {
                    lab = WSHED;
                }
            }
        }
        debug_assert!(lab != 0, "queued pixel without labelled neighbour");
        m[idx] = lab;
        if lab == WSHED {
            continue;
        }

        for n in neighbours(idx, w, h) {
            if m[n] == 0 {
                let t = color_diff(px, n, idx);
                queues[t].push_back(n);
                active = active.min(t);
                m[n] = IN_QUEUE;
            }
        }
    }

    // Anything still marked as queued cannot exist here; map leftovers to unassigned.
    let labels: Vec<i32> = m
        .into_iter()
        .map(|v| if v == IN_QUEUE { Label::RAW_UNASSIGNED } else { v })
        .collect();
    LabelMap::from_raw(markers.width, markers.height, &labels)
}

/// Label seeds, then grow them across the unknown band of `frame`.
///
/// Returns `None` when the seed masks and the frame differ in size.
pub fn grow_regions(frame: &RgbImage, seeds: &Seeds) -> Option<LabelMap> {
    if seeds.sure_foreground.dimensions() != seeds.unknown.dimensions() {
        return None;
    }
    let markers = label_markers(&seeds.sure_foreground, &seeds.unknown);
    tracing::debug!("{} seed components", markers.seed_count);
    watershed(frame, markers)
}
