//! Team color classification.
//!
//! A run-scoped, two-state model: it bootstraps a two-cluster jersey color
//! classifier exactly once, from the first frame with enough player
//! detections, and classifies individual descriptors for the rest of the
//! run. Centroids are immutable after bootstrap; there is no re-clustering.

use image::RgbImage;
use tracing::{debug, info};

use pitchvision_models::{BoundingBox, ColorDescriptor, Detection};

/// Team assignment for one color descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamAssignment {
    TeamA,
    TeamB,
    /// The model has not bootstrapped yet.
    Unknown,
}

/// Capability for two-cluster unsupervised clustering over color samples.
///
/// Returns the two centroids in computation order, or `None` when the
/// samples are degenerate (fewer than two, or all identical).
pub trait Clusterer: Send + Sync {
    fn cluster_pair(&self, samples: &[ColorDescriptor]) -> Option<(ColorDescriptor, ColorDescriptor)>;
}

/// Lloyd's k-means with k = 2 and deterministic farthest-pair seeding.
#[derive(Debug, Clone)]
pub struct KMeansClusterer {
    max_iterations: usize,
}

impl Default for KMeansClusterer {
    fn default() -> Self {
        Self { max_iterations: 50 }
    }
}

impl KMeansClusterer {
    pub fn new(max_iterations: usize) -> Self {
        Self { max_iterations }
    }
}

impl Clusterer for KMeansClusterer {
    fn cluster_pair(&self, samples: &[ColorDescriptor]) -> Option<(ColorDescriptor, ColorDescriptor)> {
        if samples.len() < 2 {
            return None;
        }

        // Deterministic seeding: the farthest pair of samples.
        let mut seed = (0, 1);
        let mut best = -1.0f64;
        for i in 0..samples.len() {
            for j in (i + 1)..samples.len() {
                let d = samples[i].distance(&samples[j]);
                if d > best {
                    best = d;
                    seed = (i, j);
                }
            }
        }
        if best <= 0.0 {
            // All samples identical; two clusters are meaningless.
            return None;
        }

        let mut centroids = [samples[seed.0], samples[seed.1]];
        let mut assignment = vec![0usize; samples.len()];

        for _ in 0..self.max_iterations {
            // Assign each sample to the nearer centroid (tie keeps the first).
            for (sample, slot) in samples.iter().zip(assignment.iter_mut()) {
                let d0 = sample.distance(&centroids[0]);
                let d1 = sample.distance(&centroids[1]);
                *slot = if d1 < d0 { 1 } else { 0 };
            }

            // Recompute means; an emptied cluster keeps its centroid.
            let mut sums = [[0.0f64; 3]; 2];
            let mut counts = [0usize; 2];
            for (sample, &slot) in samples.iter().zip(assignment.iter()) {
                for c in 0..3 {
                    sums[slot][c] += sample.0[c];
                }
                counts[slot] += 1;
            }

            let mut moved = 0.0f64;
            for k in 0..2 {
                if counts[k] == 0 {
                    continue;
                }
                let mean = ColorDescriptor([
                    sums[k][0] / counts[k] as f64,
                    sums[k][1] / counts[k] as f64,
                    sums[k][2] / counts[k] as f64,
                ]);
                moved += centroids[k].distance(&mean);
                centroids[k] = mean;
            }

            if moved < 1e-9 {
                break;
            }
        }

        Some((centroids[0], centroids[1]))
    }
}

/// Convert one RGB pixel to OpenCV-range HSV (H in [0, 180), S/V in [0, 255]).
fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [f64; 3] {
    let r = r as f64;
    let g = g as f64;
    let b = b as f64;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let v = max;
    let s = if max > 0.0 { 255.0 * delta / max } else { 0.0 };
    let h = if delta > 0.0 {
        let h = if (max - r).abs() < f64::EPSILON {
            60.0 * (g - b) / delta
        } else if (max - g).abs() < f64::EPSILON {
            120.0 + 60.0 * (b - r) / delta
        } else {
            240.0 + 60.0 * (r - g) / delta
        };
        let h = if h < 0.0 { h + 360.0 } else { h };
        h / 2.0
    } else {
        0.0
    };

    [h, s, v]
}

/// Mean HSV color over a detection's bounding box crop.
///
/// Out-of-frame or empty crops give the zero descriptor rather than an
/// error; a single bad crop must not abort a frame.
pub fn jersey_descriptor(frame: &RgbImage, bbox: &BoundingBox) -> ColorDescriptor {
    let (width, height) = frame.dimensions();
    let Some((x, y, w, h)) = bbox.to_pixel_rect(width, height) else {
        return ColorDescriptor::ZERO;
    };

    let mut sums = [0.0f64; 3];
    for py in y..y + h {
        for px in x..x + w {
            let p = frame.get_pixel(px, py);
            let hsv = rgb_to_hsv(p[0], p[1], p[2]);
            for c in 0..3 {
                sums[c] += hsv[c];
            }
        }
    }

    let count = (w * h) as f64;
    ColorDescriptor([sums[0] / count, sums[1] / count, sums[2] / count])
}

/// The two team centroids, fixed for the rest of a run once computed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TeamCentroids {
    pub team_a: ColorDescriptor,
    pub team_b: ColorDescriptor,
}

/// Run-scoped jersey color classifier.
///
/// Owned by the orchestrator, one instance per run; starts uninitialized
/// and transitions to initialized at most once.
#[derive(Debug, Clone, Default)]
pub struct TeamColorModel {
    centroids: Option<TeamCentroids>,
}

impl TeamColorModel {
    /// Create an uninitialized model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the bootstrap has happened.
    pub fn is_initialized(&self) -> bool {
        self.centroids.is_some()
    }

    /// The bootstrapped centroids, if any.
    pub fn centroids(&self) -> Option<&TeamCentroids> {
        self.centroids.as_ref()
    }

    /// Attempt the one-shot bootstrap from a frame's detections.
    ///
    /// Requires at least `min_players` player detections; otherwise this is
    /// a no-op (not an error) and will be attempted again on the next frame.
    /// Of the two computed centroids, the one with the lower saturation
    /// becomes team A; an exact tie keeps computation order, so the
    /// first-computed centroid is team A. Returns whether the transition
    /// happened; once initialized, always `false`.
    pub fn bootstrap(
        &mut self,
        detections: &[Detection],
        frame: &RgbImage,
        min_players: usize,
        clusterer: &dyn Clusterer,
    ) -> bool {
        if self.centroids.is_some() {
            return false;
        }

        let players: Vec<&Detection> = detections.iter().filter(|d| d.is_player()).collect();
        if players.len() < min_players {
            debug!(
                players = players.len(),
                required = min_players,
                "Not enough players to bootstrap team colors"
            );
            return false;
        }

        let samples: Vec<ColorDescriptor> = players
            .iter()
            .map(|d| jersey_descriptor(frame, &d.bbox))
            .collect();

        let Some((first, second)) = clusterer.cluster_pair(&samples) else {
            debug!("Clustering degenerate, deferring team color bootstrap");
            return false;
        };

        let (team_a, team_b) = if second.saturation() < first.saturation() {
            (second, first)
        } else {
            (first, second)
        };

        self.centroids = Some(TeamCentroids { team_a, team_b });
        info!(
            players = players.len(),
            team_a = ?team_a,
            team_b = ?team_b,
            "Team colors bootstrapped"
        );
        true
    }

    /// Classify one color descriptor.
    ///
    /// `Unknown` before bootstrap. An exact distance tie classifies as
    /// team B.
    pub fn classify(&self, descriptor: &ColorDescriptor) -> TeamAssignment {
        let Some(centroids) = &self.centroids else {
            return TeamAssignment::Unknown;
        };

        let da = descriptor.distance(&centroids.team_a);
        let db = descriptor.distance(&centroids.team_b);
        if da < db {
            TeamAssignment::TeamA
        } else {
            TeamAssignment::TeamB
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitchvision_models::BoundingBox;

    fn descriptor(h: f64, s: f64, v: f64) -> ColorDescriptor {
        ColorDescriptor::new(h, s, v)
    }

    /// Two-color frame: left half red, right half blue.
    fn split_frame(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                image::Rgb([200, 20, 20])
            } else {
                image::Rgb([20, 20, 200])
            }
        })
    }

    fn player_at(x1: f32, x2: f32) -> Detection {
        Detection::new("player", 0.9, BoundingBox::new(x1, 10.0, x2, 50.0))
    }

    /// 14 players, half on each colored side of the frame.
    fn two_team_scene() -> (Vec<Detection>, RgbImage) {
        let frame = split_frame(200, 100);
        let mut detections = Vec::new();
        for i in 0..7 {
            let x = (i * 10) as f32;
            detections.push(player_at(x, x + 8.0));
        }
        for i in 0..7 {
            let x = 110.0 + (i * 10) as f32;
            detections.push(player_at(x, x + 8.0));
        }
        (detections, frame)
    }

    #[test]
    fn test_kmeans_separates_two_clusters() {
        let samples = vec![
            descriptor(10.0, 10.0, 10.0),
            descriptor(12.0, 11.0, 9.0),
            descriptor(11.0, 9.0, 10.0),
            descriptor(100.0, 200.0, 150.0),
            descriptor(102.0, 198.0, 152.0),
            descriptor(98.0, 202.0, 149.0),
        ];
        let (a, b) = KMeansClusterer::default().cluster_pair(&samples).unwrap();
        let (low, high) = if a.saturation() < b.saturation() {
            (a, b)
        } else {
            (b, a)
        };
        assert!((low.saturation() - 10.0).abs() < 2.0);
        assert!((high.saturation() - 200.0).abs() < 2.0);
    }

    #[test]
    fn test_kmeans_is_deterministic() {
        let samples: Vec<ColorDescriptor> = (0..10)
            .map(|i| descriptor(i as f64 * 7.0, (i % 3) as f64 * 50.0, 100.0))
            .collect();
        let clusterer = KMeansClusterer::default();
        let first = clusterer.cluster_pair(&samples).unwrap();
        let second = clusterer.cluster_pair(&samples).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_kmeans_degenerate_input() {
        let clusterer = KMeansClusterer::default();
        assert!(clusterer.cluster_pair(&[]).is_none());
        assert!(clusterer.cluster_pair(&[descriptor(1.0, 2.0, 3.0)]).is_none());
        let identical = vec![descriptor(5.0, 5.0, 5.0); 14];
        assert!(clusterer.cluster_pair(&identical).is_none());
    }

    #[test]
    fn test_rgb_to_hsv_opencv_ranges() {
        // Pure red: H=0, S=255, V=255.
        assert_eq!(rgb_to_hsv(255, 0, 0), [0.0, 255.0, 255.0]);
        // Pure green: H=120deg -> 60 in OpenCV half-range.
        assert_eq!(rgb_to_hsv(0, 255, 0), [60.0, 255.0, 255.0]);
        // Gray: no hue, no saturation.
        assert_eq!(rgb_to_hsv(128, 128, 128), [0.0, 0.0, 128.0]);
    }

    #[test]
    fn test_jersey_descriptor_uniform_crop() {
        let frame = RgbImage::from_pixel(50, 50, image::Rgb([0, 255, 0]));
        let d = jersey_descriptor(&frame, &BoundingBox::new(10.0, 10.0, 30.0, 30.0));
        assert!((d.hue() - 60.0).abs() < 1e-9);
        assert!((d.saturation() - 255.0).abs() < 1e-9);
    }

    #[test]
    fn test_jersey_descriptor_empty_crop() {
        let frame = RgbImage::from_pixel(50, 50, image::Rgb([255, 255, 255]));
        let d = jersey_descriptor(&frame, &BoundingBox::new(100.0, 100.0, 120.0, 120.0));
        assert_eq!(d, ColorDescriptor::ZERO);
    }

    #[test]
    fn test_classify_unknown_before_bootstrap() {
        let model = TeamColorModel::new();
        assert!(!model.is_initialized());
        assert_eq!(
            model.classify(&descriptor(10.0, 10.0, 10.0)),
            TeamAssignment::Unknown
        );
    }

    #[test]
    fn test_bootstrap_requires_min_players() {
        let (mut detections, frame) = two_team_scene();
        detections.truncate(10);
        let mut model = TeamColorModel::new();
        assert!(!model.bootstrap(&detections, &frame, 14, &KMeansClusterer::default()));
        assert!(!model.is_initialized());
    }

    #[test]
    fn test_bootstrap_ignores_non_player_detections() {
        let (mut detections, frame) = two_team_scene();
        detections.truncate(10);
        for _ in 0..10 {
            detections.push(Detection::new(
                "ball",
                0.9,
                BoundingBox::new(0.0, 0.0, 5.0, 5.0),
            ));
        }
        let mut model = TeamColorModel::new();
        assert!(!model.bootstrap(&detections, &frame, 14, &KMeansClusterer::default()));
    }

    #[test]
    fn test_bootstrap_happens_once() {
        let (detections, frame) = two_team_scene();
        let clusterer = KMeansClusterer::default();
        let mut model = TeamColorModel::new();

        assert!(model.bootstrap(&detections, &frame, 14, &clusterer));
        assert!(model.is_initialized());
        let centroids = *model.centroids().unwrap();

        // A second attempt never re-clusters, even with different input.
        assert!(!model.bootstrap(&detections, &frame, 14, &clusterer));
        assert_eq!(*model.centroids().unwrap(), centroids);
    }

    #[test]
    fn test_team_a_has_lower_saturation() {
        let (detections, frame) = two_team_scene();
        let mut model = TeamColorModel::new();
        assert!(model.bootstrap(&detections, &frame, 14, &KMeansClusterer::default()));
        let centroids = model.centroids().unwrap();
        assert!(centroids.team_a.saturation() <= centroids.team_b.saturation());
    }

    #[test]
    fn test_classify_picks_nearer_centroid() {
        let (detections, frame) = two_team_scene();
        let mut model = TeamColorModel::new();
        assert!(model.bootstrap(&detections, &frame, 14, &KMeansClusterer::default()));
        let centroids = *model.centroids().unwrap();

        assert_eq!(model.classify(&centroids.team_a), TeamAssignment::TeamA);
        assert_eq!(model.classify(&centroids.team_b), TeamAssignment::TeamB);
    }

    #[test]
    fn test_classify_tie_goes_to_team_b() {
        let mut model = TeamColorModel::new();
        model.centroids = Some(TeamCentroids {
            team_a: descriptor(0.0, 0.0, 0.0),
            team_b: descriptor(10.0, 0.0, 0.0),
        });
        // Exactly equidistant from both centroids.
        assert_eq!(
            model.classify(&descriptor(5.0, 0.0, 0.0)),
            TeamAssignment::TeamB
        );
    }
}
