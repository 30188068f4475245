use std::collections::{HashMap, VecDeque};

use image::GrayImage;
use crate::{error::Result, traits::ContourTracer, types::Contour};

type Point = [f64; 2];
type PointKey = (u64, u64);

fn key(point: Point) -> PointKey {
    (point[0].to_bits(), point[1].to_bits())
}

/// Marching-squares iso-contour tracer.
///
/// Crossing points are linearly interpolated along cell edges, saddle cells
/// keep the high-valued corners disconnected, and only closed rings are
/// returned, in the order their first segment was met scanning row by row.
#[derive(Debug, Clone)]
pub struct MarchingSquares {
    pub level: f64,
}

impl Default for MarchingSquares {
    fn default() -> Self {
        Self { level: 0.5 }
    }
}

impl ContourTracer for MarchingSquares {
    fn trace(&self, grid: &GrayImage) -> Result<Vec<Contour>> {
        let segments = self.segments(grid);
        let contours = assemble(segments)
            .into_iter()
            .filter(|contour| is_closed(contour))
            .collect();
        Ok(contours)
    }
}

impl MarchingSquares {
    fn segments(&self, grid: &GrayImage) -> Vec<(Point, Point)> {
        let (width, height) = grid.dimensions();
        let mut segments = Vec::new();
        if width < 2 || height < 2 {
            return segments;
        }

        let level = self.level;
        let value = |x: u32, y: u32| f64::from(grid.get_pixel(x, y)[0]);

        for r0 in 0..height - 1 {
            let r1 = r0 + 1;
            for c0 in 0..width - 1 {
                let c1 = c0 + 1;
                let ul = value(c0, r0);
                let ur = value(c1, r0);
                let ll = value(c0, r1);
                let lr = value(c1, r1);

                let case = u8::from(ul > level)
                    | u8::from(ur > level) << 1
                    | u8::from(ll > level) << 2
                    | u8::from(lr > level) << 3;
                if case == 0 || case == 15 {
                    continue;
                }

                let (row0, row1) = (f64::from(r0), f64::from(r1));
                let (col0, col1) = (f64::from(c0), f64::from(c1));
                let top = [row0, col0 + fraction(ul, ur, level)];
                let bottom = [row1, col0 + fraction(ll, lr, level)];
                let left = [row0 + fraction(ul, ll, level), col0];
                let right = [row0 + fraction(ur, lr, level), col1];

                match case {
                    1 => segments.push((top, left)),
                    2 => segments.push((right, top)),
                    3 => segments.push((right, left)),
                    4 => segments.push((left, bottom)),
                    5 => segments.push((top, bottom)),
                    6 => {
                        segments.push((right, top));
                        segments.push((left, bottom));
                    }
                    7 => segments.push((right, bottom)),
                    8 => segments.push((bottom, right)),
                    9 => {
                        segments.push((top, left));
                        segments.push((bottom, right));
                    }
                    10 => segments.push((bottom, top)),
                    11 => segments.push((bottom, left)),
                    12 => segments.push((left, right)),
                    13 => segments.push((top, right)),
                    14 => segments.push((left, top)),
                    _ => {}
                }
            }
        }
        segments
    }
}

fn fraction(from: f64, to: f64, level: f64) -> f64 {
    if to == from {
        0.0
    } else {
        (level - from) / (to - from)
    }
}

fn is_closed(contour: &[Point]) -> bool {
    contour.len() > 2 && contour.first() == contour.last()
}

/// Chain directed segments into polylines, joining on shared endpoints.
fn assemble(segments: Vec<(Point, Point)>) -> Vec<Contour> {
    let mut contours: Vec<Option<VecDeque<Point>>> = Vec::new();
    let mut starts: HashMap<PointKey, usize> = HashMap::new();
    let mut ends: HashMap<PointKey, usize> = HashMap::new();

    for (from, to) in segments {
        if from == to {
            continue;
        }

        let tail = starts.remove(&key(to));
        let head = ends.remove(&key(from));

        match (tail, head) {
            (Some(tail), Some(head)) if tail == head => {
                // ring closes on itself
                if let Some(points) = contours[head].as_mut() {
                    points.push_back(to);
                }
            }
            (Some(tail), Some(head)) => {
                // keep the older contour, absorb the newer one
                if tail > head {
                    let tail_points = contours[tail].take().unwrap_or_default();
                    if let Some(points) = contours[head].as_mut() {
                        points.extend(tail_points);
                        if let Some(&last) = points.back() {
                            ends.insert(key(last), head);
                        }
                    }
                } else {
                    let head_points = contours[head].take().unwrap_or_default();
                    if let Some(points) = contours[tail].as_mut() {
                        for point in head_points.into_iter().rev() {
                            points.push_front(point);
                        }
                        if let Some(&first) = points.front() {
                            starts.insert(key(first), tail);
                        }
                    }
                }
            }
            (Some(tail), None) => {
                if let Some(points) = contours[tail].as_mut() {
                    points.push_front(from);
                }
                starts.insert(key(from), tail);
            }
            (None, Some(head)) => {
                if let Some(points) = contours[head].as_mut() {
                    points.push_back(to);
                }
                ends.insert(key(to), head);
            }
            (None, None) => {
                let index = contours.len();
                contours.push(Some(VecDeque::from([from, to])));
                starts.insert(key(from), index);
                ends.insert(key(to), index);
            }
        }
    }

    contours.into_iter().flatten().map(Vec::from).collect()
}
