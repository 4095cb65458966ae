use image::{GrayImage, Luma, Rgb, RgbImage};
use tracing::debug;

use crate::{
    config::{ClusteringConfig, ColorWindowConfig},
    error::{Result, WallMaskError},
    traits::DominantColorEstimator,
    types::{BACKGROUND, ColorWindow, WALL, WallMask},
};

/// Drops near-white page background from the pixel population
#[derive(Debug, Clone)]
pub struct BackgroundFilter {
    pub threshold: u8,
}

impl Default for BackgroundFilter {
    fn default() -> Self {
        Self { threshold: 220 }
    }
}

impl BackgroundFilter {
    /// Background means every channel is at or above the threshold.
    pub fn is_background(&self, pixel: &Rgb<u8>) -> bool {
        pixel.0.iter().all(|&c| c >= self.threshold)
    }

    /// Flatten the image into the pixels that are not background, in row-major order.
    pub fn filter(&self, image: &RgbImage) -> Vec<Rgb<u8>> {
        image
            .pixels()
            .filter(|p| !self.is_background(p))
            .copied()
            .collect()
    }
}

/// Thresholds an image against a color window around the dominant color
#[derive(Debug, Clone)]
pub struct MaskBuilder {
    pub lower_delta: f32,
    pub upper_delta: f32,
}

impl Default for MaskBuilder {
    fn default() -> Self {
        Self::from(&ColorWindowConfig::default())
    }
}

impl From<&ColorWindowConfig> for MaskBuilder {
    fn from(config: &ColorWindowConfig) -> Self {
        Self {
            lower_delta: config.lower_delta,
            upper_delta: config.upper_delta,
        }
    }
}

impl MaskBuilder {
    pub fn window(&self, dominant_color: [f32; 3]) -> ColorWindow {
        ColorWindow::around(dominant_color, self.lower_delta, self.upper_delta)
    }

    pub fn build(&self, image: &RgbImage, dominant_color: [f32; 3]) -> WallMask {
        threshold_window(image, &self.window(dominant_color))
    }
}

/// Mark every pixel inside `window` as wall.
pub fn threshold_window(image: &RgbImage, window: &ColorWindow) -> WallMask {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if window.contains(image.get_pixel(x, y)) {
            Luma([WALL])
        } else {
            Luma([BACKGROUND])
        }
    })
}

/// Deterministic k-means over RGB values; the most populated centroid wins.
///
/// Seeding is farthest-point: the first centroid is the middle pixel of the
/// population, each following one is the pixel furthest from all chosen
/// centroids.
#[derive(Debug, Clone)]
pub struct KMeansColorEstimator {
    pub clusters: usize,
    pub max_iterations: usize,
    pub tolerance: f32,
}

impl Default for KMeansColorEstimator {
    fn default() -> Self {
        Self::from(&ClusteringConfig::default())
    }
}

impl From<&ClusteringConfig> for KMeansColorEstimator {
    fn from(config: &ClusteringConfig) -> Self {
        Self {
            clusters: config.clusters,
            max_iterations: config.max_iterations,
            tolerance: config.tolerance,
        }
    }
}

fn dist_sq(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    (0..3).map(|i| (a[i] - b[i]) * (a[i] - b[i])).sum()
}

fn nearest(point: &[f32; 3], centroids: &[[f32; 3]]) -> usize {
    let mut best = 0;
    let mut best_dist = f32::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = dist_sq(point, c);
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

impl KMeansColorEstimator {
    fn seed(&self, points: &[[f32; 3]]) -> Vec<[f32; 3]> {
        let mut centroids = Vec::with_capacity(self.clusters);
        centroids.push(points[points.len() / 2]);

        while centroids.len() < self.clusters {
            let (mut best_dist, mut best_idx) = (0.0f32, None);
            for (i, p) in points.iter().enumerate() {
                let d = centroids
                    .iter()
                    .map(|c| dist_sq(p, c))
                    .fold(f32::INFINITY, f32::min);
                if d > best_dist {
                    best_dist = d;
                    best_idx = Some(i);
                }
            }
            // fewer distinct colors than clusters
            match best_idx {
                Some(i) => centroids.push(points[i]),
                None => break,
            }
        }
        centroids
    }

    fn counts(points: &[[f32; 3]], centroids: &[[f32; 3]]) -> Vec<usize> {
        let mut counts = vec![0usize; centroids.len()];
        for p in points {
            counts[nearest(p, centroids)] += 1;
        }
        counts
    }
}

impl DominantColorEstimator for KMeansColorEstimator {
    fn estimate(&self, pixels: &[Rgb<u8>]) -> Result<[f32; 3]> {
        if pixels.is_empty() {
            return Err(WallMaskError::EmptyPixelPopulation(0));
        }
        if self.clusters == 0 {
            return Err(WallMaskError::InvalidConfig("k-means needs at least one cluster".into()));
        }

        let points: Vec<[f32; 3]> = pixels
            .iter()
            .map(|p| [p[0] as f32, p[1] as f32, p[2] as f32])
            .collect();
        let mut centroids = self.seed(&points);

        let mut sums = vec![[0.0f64; 3]; centroids.len()];
        let mut counts = vec![0usize; centroids.len()];
        let mut iterations = 0;
        while iterations < self.max_iterations {
            iterations += 1;
            sums.fill([0.0; 3]);
            counts.fill(0);

            for p in &points {
                let c = nearest(p, &centroids);
                counts[c] += 1;
                for i in 0..3 {
                    sums[c][i] += p[i] as f64;
                }
            }

            let mut shift = 0.0f32;
            for (c, centroid) in centroids.iter_mut().enumerate() {
                if counts[c] == 0 {
                    continue;
                }
                let updated = sums[c].map(|s| (s / counts[c] as f64) as f32);
                shift = shift.max(dist_sq(centroid, &updated).sqrt());
                *centroid = updated;
            }

            if shift <= self.tolerance {
                break;
            }
        }

        let counts = Self::counts(&points, &centroids);
        let (dominant, _) = counts
            .iter()
            .enumerate()
            .fold((0, 0), |best, (i, &n)| if n > best.1 { (i, n) } else { best });

        debug!(
            population = points.len(),
            clusters = centroids.len(),
            iterations,
            ?counts,
            color = ?centroids[dominant],
            "estimated dominant color"
        );

        Ok(centroids[dominant])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_filter_boundary() {
        let filter = BackgroundFilter::default();
        assert!(filter.is_background(&Rgb([220, 220, 220])));
        assert!(filter.is_background(&Rgb([255, 230, 221])));
        assert!(!filter.is_background(&Rgb([219, 255, 255])));
        assert!(!filter.is_background(&Rgb([255, 255, 219])));
        assert!(!filter.is_background(&Rgb([0, 0, 0])));
    }

    #[test]
    fn background_filter_keeps_only_non_white() {
        let mut image = RgbImage::from_pixel(10, 10, Rgb([250, 250, 250]));
        image.put_pixel(3, 4, Rgb([40, 40, 40]));
        image.put_pixel(7, 1, Rgb([230, 100, 230]));

        let population = BackgroundFilter::default().filter(&image);
        assert_eq!(population, vec![Rgb([230, 100, 230]), Rgb([40, 40, 40])]);
    }

    #[test]
    fn all_white_image_yields_empty_population() {
        let image = RgbImage::from_pixel(8, 8, Rgb([255, 255, 255]));
        assert!(BackgroundFilter::default().filter(&image).is_empty());
    }

    #[test]
    fn estimator_rejects_empty_population() {
        let result = KMeansColorEstimator::default().estimate(&[]);
        assert!(matches!(result, Err(WallMaskError::EmptyPixelPopulation(0))));
    }

    #[test]
    fn estimator_picks_majority_color() {
        let mut pixels = vec![Rgb([60, 60, 60]); 500];
        pixels.extend(vec![Rgb([200, 30, 30]); 120]);
        pixels.extend(vec![Rgb([30, 30, 200]); 80]);

        let color = KMeansColorEstimator::default().estimate(&pixels).unwrap();
        for c in color {
            assert!((c - 60.0).abs() < 0.5, "got {color:?}");
        }
    }

    #[test]
    fn estimator_handles_single_color() {
        let pixels = vec![Rgb([12, 34, 56]); 10];
        let color = KMeansColorEstimator::default().estimate(&pixels).unwrap();
        assert_eq!(color, [12.0, 34.0, 56.0]);
    }

    #[test]
    fn mask_builder_marks_window() {
        let mut image = RgbImage::from_pixel(4, 1, Rgb([255, 255, 255]));
        image.put_pixel(0, 0, Rgb([50, 50, 50]));
        image.put_pixel(1, 0, Rgb([40, 40, 40]));
        image.put_pixel(2, 0, Rgb([75, 75, 75]));
        image.put_pixel(3, 0, Rgb([39, 50, 50]));

        let mask = MaskBuilder::default().build(&image, [50.0, 50.0, 50.0]);
        let values: Vec<u8> = mask.pixels().map(|p| p[0]).collect();
        assert_eq!(values, vec![WALL, WALL, WALL, BACKGROUND]);
    }

    #[test]
    fn widening_window_never_loses_pixels() {
        let image = RgbImage::from_fn(32, 32, |x, y| {
            Rgb([(x * 8) as u8, (y * 8) as u8, ((x + y) * 4) as u8])
        });
        let count = |mask: &WallMask| mask.pixels().filter(|p| p[0] == WALL).count();

        let color = [100.0, 100.0, 100.0];
        let mut previous = 0;
        for widen in [0.0, 5.0, 20.0, 60.0, 255.0] {
            let window = ColorWindow::around(color, 10.0 + widen, 25.0 + widen);
            let marked = count(&threshold_window(&image, &window));
            assert!(marked >= previous);
            previous = marked;
        }
        assert_eq!(previous, 32 * 32);
    }
}
