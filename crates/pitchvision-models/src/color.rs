//! Jersey color descriptors.

use serde::{Deserialize, Serialize};

/// Mean-color summary of the pixels inside a detection's bounding box.
///
/// Channels follow OpenCV HSV conventions: hue in [0, 180), saturation and
/// value in [0, 255]. The descriptor is derived per classification call and
/// never stored beyond it; only the two team centroids outlive a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorDescriptor(pub [f64; 3]);

impl ColorDescriptor {
    /// The zero descriptor, used for empty crops.
    pub const ZERO: ColorDescriptor = ColorDescriptor([0.0; 3]);

    /// Create a descriptor from channel values.
    pub fn new(hue: f64, saturation: f64, value: f64) -> Self {
        Self([hue, saturation, value])
    }

    /// Hue channel.
    pub fn hue(&self) -> f64 {
        self.0[0]
    }

    /// Saturation channel.
    pub fn saturation(&self) -> f64 {
        self.0[1]
    }

    /// Value (brightness) channel.
    pub fn value(&self) -> f64 {
        self.0[2]
    }

    /// Euclidean distance to another descriptor.
    pub fn distance(&self, other: &ColorDescriptor) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_to_self_is_zero() {
        let d = ColorDescriptor::new(90.0, 128.0, 200.0);
        assert_eq!(d.distance(&d), 0.0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = ColorDescriptor::new(10.0, 20.0, 30.0);
        let b = ColorDescriptor::new(40.0, 60.0, 80.0);
        assert!((a.distance(&b) - b.distance(&a)).abs() < 1e-12);
    }

    #[test]
    fn test_distance_known_value() {
        let a = ColorDescriptor::ZERO;
        let b = ColorDescriptor::new(3.0, 4.0, 0.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-12);
    }
}
