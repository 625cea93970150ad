//! PaddleOCR engine via ONNX Runtime
//!
//! Two-stage pipeline: DB text detection produces a per-pixel probability
//! map from which axis-aligned regions are extracted, then a CRNN
//! recognition model reads each region and a greedy CTC decode maps the
//! output to characters from the dictionary.

use anyhow::{Context, Result};
use image::{imageops, RgbImage};
use ort::session::{builder::GraphOptimizationLevel, Session};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use super::{Detection, ModelKind, ModelManager, TextDetector};

/// Longest image side fed to the detection model
const DET_MAX_SIDE: u32 = 960;
/// Detection input dimensions must be a multiple of this
const DET_STRIDE: u32 = 32;
/// Threshold for binarizing the probability map
const DET_THRESH: f32 = 0.3;
/// Regions whose mean probability falls below this are dropped
const BOX_SCORE_THRESH: f32 = 0.6;
/// Minimum region side length in map pixels
const MIN_REGION_SIDE: u32 = 3;
/// DB unclip ratio: regions grow by `area * ratio / perimeter` per side
const UNCLIP_RATIO: f32 = 1.5;
/// Recognition model input height
const REC_HEIGHT: u32 = 48;
/// Recognition model input width cap
const REC_MAX_WIDTH: u32 = 320;

const DET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const DET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// ONNX-backed text detector. Sessions sit behind mutexes because `ort`
/// inference takes the session mutably; the handle itself can be shared
/// freely once loaded.
pub struct PaddleOcrEngine {
    det: Mutex<Session>,
    rec: Mutex<Session>,
    dict: Vec<String>,
}

impl PaddleOcrEngine {
    /// Load both models and the dictionary, downloading them on a cold
    /// cache. Expensive (seconds); callers memoize the result.
    pub fn load(manager: &ModelManager) -> Result<Self> {
        let det_path = manager.ensure(ModelKind::Detection)?;
        let rec_path = manager.ensure(ModelKind::Recognition)?;
        let dict_path = manager.ensure(ModelKind::Dictionary)?;

        let start = Instant::now();
        let det = load_session(&det_path)?;
        let rec = load_session(&rec_path)?;
        let dict: Vec<String> = std::fs::read_to_string(&dict_path)
            .context("Failed to read character dictionary")?
            .lines()
            .map(str::to_string)
            .collect();

        info!(
            "Detector ready in {:?} ({} dictionary entries)",
            start.elapsed(),
            dict.len()
        );

        Ok(Self {
            det: Mutex::new(det),
            rec: Mutex::new(rec),
            dict,
        })
    }

    /// Stage one: localize text regions in source-image coordinates.
    fn locate(&self, image: &RgbImage) -> Result<Vec<MapRegion>> {
        let (src_w, src_h) = image.dimensions();
        let (in_w, in_h) = det_input_size(src_w, src_h);
        let resized = imageops::resize(image, in_w, in_h, imageops::FilterType::Triangle);

        // NCHW, ImageNet-normalized
        let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, in_h as usize, in_w as usize));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] =
                    (pixel[c] as f32 / 255.0 - DET_MEAN[c]) / DET_STD[c];
            }
        }

        let shape = tensor.shape().to_vec();
        let data = tensor.into_raw_vec_and_offset().0;
        let input = ort::value::Value::from_array((shape, data))?;

        let mut session = self.det.lock();
        let outputs = session.run(ort::inputs![input])?;
        let (shape, prob) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: Vec<usize> = shape.iter().map(|&v| v as usize).collect();

        let (map_h, map_w) = (dims[dims.len() - 2], dims[dims.len() - 1]);
        let mut regions = extract_regions(prob, map_w, map_h);

        // Map back to source coordinates
        let sx = src_w as f32 / map_w as f32;
        let sy = src_h as f32 / map_h as f32;
        for region in &mut regions {
            region.x1 = (region.x1 * sx).max(0.0);
            region.y1 = (region.y1 * sy).max(0.0);
            region.x2 = (region.x2 * sx).min(src_w as f32);
            region.y2 = (region.y2 * sy).min(src_h as f32);
        }

        Ok(regions)
    }

    /// Stage two: read the text inside one region.
    fn recognize(&self, image: &RgbImage, region: &MapRegion) -> Result<(String, f32)> {
        let x = region.x1 as u32;
        let y = region.y1 as u32;
        let w = (region.x2 as u32).saturating_sub(x).max(1);
        let h = (region.y2 as u32).saturating_sub(y).max(1);
        let crop = imageops::crop_imm(image, x, y, w, h).to_image();

        let target_w = (w * REC_HEIGHT / h).clamp(16, REC_MAX_WIDTH);
        let resized = imageops::resize(&crop, target_w, REC_HEIGHT, imageops::FilterType::Triangle);

        let mut tensor =
            ndarray::Array4::<f32>::zeros((1, 3, REC_HEIGHT as usize, target_w as usize));
        for (px, py, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, py as usize, px as usize]] = (pixel[c] as f32 / 255.0 - 0.5) / 0.5;
            }
        }

        let shape = tensor.shape().to_vec();
        let data = tensor.into_raw_vec_and_offset().0;
        let input = ort::value::Value::from_array((shape, data))?;

        let mut session = self.rec.lock();
        let outputs = session.run(ort::inputs![input])?;
        let (shape, probs) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: Vec<usize> = shape.iter().map(|&v| v as usize).collect();

        let (steps, classes) = (dims[dims.len() - 2], dims[dims.len() - 1]);
        Ok(ctc_greedy_decode(probs, steps, classes, &self.dict))
    }
}

impl TextDetector for PaddleOcrEngine {
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>> {
        let start = Instant::now();
        let regions = self.locate(image)?;

        let mut detections = Vec::with_capacity(regions.len());
        for region in regions {
            let (text, confidence) = self.recognize(image, &region)?;
            debug!(
                "region ({:.0},{:.0})-({:.0},{:.0}) det score {:.2}: {:?} ({:.2})",
                region.x1, region.y1, region.x2, region.y2, region.score, text, confidence
            );
            if text.is_empty() {
                continue;
            }
            detections.push(Detection {
                quad: region.quad(),
                text,
                confidence,
            });
        }

        debug!(
            "Detection complete in {:?}: {} text regions",
            start.elapsed(),
            detections.len()
        );
        Ok(detections)
    }
}

fn load_session(path: &Path) -> Result<Session> {
    debug!("Loading ONNX model from {:?}", path);
    Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(ort::Error::<()>::from)?
        .with_intra_threads(4)
        .map_err(ort::Error::<()>::from)?
        .commit_from_file(path)
        .with_context(|| format!("Failed to load ONNX model from {:?}", path))
}

/// Choose detection input dimensions: longest side capped at
/// `DET_MAX_SIDE`, both sides rounded to a multiple of `DET_STRIDE`.
fn det_input_size(width: u32, height: u32) -> (u32, u32) {
    let longest = width.max(height);
    let scale = if longest > DET_MAX_SIDE {
        DET_MAX_SIDE as f32 / longest as f32
    } else {
        1.0
    };

    let round = |v: u32| -> u32 {
        let scaled = (v as f32 * scale).round() as u32;
        (scaled / DET_STRIDE).max(1) * DET_STRIDE
    };
    (round(width), round(height))
}

/// A detected region in map (or, after rescaling, source) coordinates.
#[derive(Debug, Clone)]
struct MapRegion {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
}

impl MapRegion {
    fn quad(&self) -> [(f32, f32); 4] {
        [
            (self.x1, self.y1),
            (self.x2, self.y1),
            (self.x2, self.y2),
            (self.x1, self.y2),
        ]
    }
}

/// Threshold the probability map and pull out 4-connected components as
/// scored boxes, expanded by the DB unclip distance.
fn extract_regions(prob: &[f32], width: usize, height: usize) -> Vec<MapRegion> {
    let mut visited = vec![false; width * height];
    let mut regions = Vec::new();

    for start in 0..width * height {
        if visited[start] || prob[start] <= DET_THRESH {
            continue;
        }

        // BFS flood fill over the thresholded mask
        let mut queue = VecDeque::new();
        queue.push_back(start);
        visited[start] = true;

        let (mut min_x, mut max_x) = (start % width, start % width);
        let (mut min_y, mut max_y) = (start / width, start / width);
        let mut sum = 0.0f32;
        let mut count = 0u32;

        while let Some(idx) = queue.pop_front() {
            let (x, y) = (idx % width, idx / width);
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
            sum += prob[idx];
            count += 1;

            let mut push = |nx: usize, ny: usize| {
                let nidx = ny * width + nx;
                if !visited[nidx] && prob[nidx] > DET_THRESH {
                    visited[nidx] = true;
                    queue.push_back(nidx);
                }
            };
            if x > 0 {
                push(x - 1, y);
            }
            if x + 1 < width {
                push(x + 1, y);
            }
            if y > 0 {
                push(x, y - 1);
            }
            if y + 1 < height {
                push(x, y + 1);
            }
        }

        let w = (max_x - min_x + 1) as u32;
        let h = (max_y - min_y + 1) as u32;
        if w < MIN_REGION_SIDE || h < MIN_REGION_SIDE {
            continue;
        }

        let score = sum / count as f32;
        if score < BOX_SCORE_THRESH {
            continue;
        }

        // DB unclip: the shrunk prediction is grown back by
        // area * ratio / perimeter on each side
        let area = (w * h) as f32;
        let perimeter = 2.0 * (w + h) as f32;
        let grow = area * UNCLIP_RATIO / perimeter;

        regions.push(MapRegion {
            x1: (min_x as f32 - grow).max(0.0),
            y1: (min_y as f32 - grow).max(0.0),
            x2: (max_x as f32 + 1.0 + grow).min(width as f32),
            y2: (max_y as f32 + 1.0 + grow).min(height as f32),
            score,
        });
    }

    // Emission order: top to bottom, then left to right
    regions.sort_by(|a, b| {
        (a.y1, a.x1)
            .partial_cmp(&(b.y1, b.x1))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    regions
}

/// Greedy CTC decode: per step take the argmax, drop blanks (class 0) and
/// repeats. Class `dict.len() + 1` is the space appended by PaddleOCR's
/// `use_space_char`. Confidence is the mean of the kept maxima.
fn ctc_greedy_decode(probs: &[f32], steps: usize, classes: usize, dict: &[String]) -> (String, f32) {
    let mut text = String::new();
    let mut conf_sum = 0.0f32;
    let mut kept = 0u32;
    let mut prev_class = 0usize;

    for t in 0..steps {
        let row = &probs[t * classes..(t + 1) * classes];
        let (best, &best_prob) = row
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .unwrap_or((0, &0.0));

        if best != 0 && best != prev_class {
            if best <= dict.len() {
                text.push_str(&dict[best - 1]);
            } else {
                text.push(' ');
            }
            conf_sum += best_prob;
            kept += 1;
        }
        prev_class = best;
    }

    let confidence = if kept > 0 { conf_sum / kept as f32 } else { 0.0 };
    (text.trim().to_string(), confidence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_det_input_size_rounds_to_stride() {
        let (w, h) = det_input_size(200, 100);
        assert_eq!(w % DET_STRIDE, 0);
        assert_eq!(h % DET_STRIDE, 0);
        assert!(w >= DET_STRIDE && h >= DET_STRIDE);
    }

    #[test]
    fn test_det_input_size_caps_long_side() {
        let (w, h) = det_input_size(4000, 2000);
        assert!(w <= DET_MAX_SIDE && h <= DET_MAX_SIDE);
        assert_eq!(w % DET_STRIDE, 0);
        assert_eq!(h % DET_STRIDE, 0);
    }

    #[test]
    fn test_extract_regions_finds_blob() {
        // 20x20 map with a confident 6x4 blob
        let (w, h) = (20usize, 20usize);
        let mut prob = vec![0.0f32; w * h];
        for y in 5..9 {
            for x in 3..9 {
                prob[y * w + x] = 0.95;
            }
        }

        let regions = extract_regions(&prob, w, h);
        assert_eq!(regions.len(), 1);
        let r = &regions[0];
        assert!(r.score > 0.9);
        // Unclip must grow the raw component bounds
        assert!(r.x1 < 3.0 && r.x2 > 9.0);
        assert!(r.y1 < 5.0 && r.y2 > 9.0);
    }

    #[test]
    fn test_extract_regions_drops_weak_and_tiny() {
        let (w, h) = (20usize, 20usize);
        let mut prob = vec![0.0f32; w * h];
        // Above the binarization threshold but below the box score floor
        for y in 2..8 {
            for x in 2..10 {
                prob[y * w + x] = 0.4;
            }
        }
        // Confident but below the minimum side length
        prob[15 * w + 15] = 0.99;
        prob[15 * w + 16] = 0.99;

        assert!(extract_regions(&prob, w, h).is_empty());
    }

    #[test]
    fn test_extract_regions_emission_order() {
        let (w, h) = (40usize, 40usize);
        let mut prob = vec![0.0f32; w * h];
        for y in 30..35 {
            for x in 2..12 {
                prob[y * w + x] = 0.9;
            }
        }
        for y in 2..7 {
            for x in 20..30 {
                prob[y * w + x] = 0.9;
            }
        }

        let regions = extract_regions(&prob, w, h);
        assert_eq!(regions.len(), 2);
        assert!(regions[0].y1 < regions[1].y1);
    }

    #[test]
    fn test_ctc_greedy_decode() {
        let dict: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        // classes: 0=blank, 1=a, 2=b, 3=c, 4=space
        let classes = 5;
        // Steps: a, a (repeat collapses), blank, b, space, c
        let rows: Vec<usize> = vec![1, 1, 0, 2, 4, 3];
        let mut probs = vec![0.0f32; rows.len() * classes];
        for (t, &class) in rows.iter().enumerate() {
            probs[t * classes + class] = 0.8;
        }

        let (text, confidence) = ctc_greedy_decode(&probs, rows.len(), classes, &dict);
        assert_eq!(text, "ab c");
        assert!((confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_ctc_decode_blank_only() {
        let dict: Vec<String> = vec!["a".to_string()];
        let probs = vec![0.9f32, 0.1, 0.0, 0.9, 0.1, 0.0];
        let (text, confidence) = ctc_greedy_decode(&probs, 2, 3, &dict);
        assert!(text.is_empty());
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn test_region_quad_corners() {
        let region = MapRegion {
            x1: 20.0,
            y1: 40.0,
            x2: 120.0,
            y2: 70.0,
            score: 0.9,
        };
        assert_eq!(
            region.quad(),
            [(20.0, 40.0), (120.0, 40.0), (120.0, 70.0), (20.0, 70.0)]
        );
    }
}
