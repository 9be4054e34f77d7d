use image::{Rgb, RgbImage};

const CHANNELS: usize = 3;
// Largest L1 distance between two RGB8 pixels.
const MAX_COLOR_DISTANCE: usize = 255 * CHANNELS;

/// Edge-preserving smoothing filter with precomputed weight tables.
///
/// Each output pixel is the weighted mean of its neighbourhood, where the
/// weight is the product of a spatial Gaussian on the offset and a range
/// Gaussian on the L1 color distance to the center pixel. Samples outside the
/// image clamp to the nearest edge pixel.
#[derive(Debug, Clone)]
pub struct BilateralFilter {
    radius: u32,
    space_kernel: Vec<(i64, i64, f32)>,
    color_weights: Vec<f32>,
}

impl BilateralFilter {
    /// Builds a filter for a neighbourhood of `diameter` pixels.
    ///
    /// A non-positive diameter derives the radius from `sigma_space`.
    /// Non-positive sigmas fall back to 1.0.
    pub fn new(diameter: i32, sigma_color: f64, sigma_space: f64) -> Self {
        let sigma_color = if sigma_color > 0.0 { sigma_color } else { 1.0 };
        let sigma_space = if sigma_space > 0.0 { sigma_space } else { 1.0 };

        let radius = if diameter <= 0 {
            (sigma_space * 1.5).round() as u32
        } else {
            (diameter / 2) as u32
        }
        .max(1);

        let color_coeff = -0.5 / (sigma_color * sigma_color);
        let space_coeff = -0.5 / (sigma_space * sigma_space);

        let color_weights = (0..=MAX_COLOR_DISTANCE)
            .map(|distance| {
                let distance = distance as f64;
                (distance * distance * color_coeff).exp() as f32
            })
            .collect();

        let r = i64::from(radius);
        let mut space_kernel = Vec::new();
        for dy in -r..=r {
            for dx in -r..=r {
                let dist_sq = (dx * dx + dy * dy) as f64;
                if dist_sq.sqrt() > f64::from(radius) {
                    continue;
                }
                space_kernel.push((dx, dy, (dist_sq * space_coeff).exp() as f32));
            }
        }

        Self {
            radius,
            space_kernel,
            color_weights,
        }
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    pub fn apply(&self, input: &RgbImage) -> RgbImage {
        RgbImage::from_fn(input.width(), input.height(), |x, y| {
            self.filter_pixel(input, x, y)
        })
    }

    fn filter_pixel(&self, input: &RgbImage, x: u32, y: u32) -> Rgb<u8> {
        let max_x = i64::from(input.width()) - 1;
        let max_y = i64::from(input.height()) - 1;
        let center = input.get_pixel(x, y).0;

        let mut sums = [0f32; CHANNELS];
        let mut weight_total = 0f32;

        for &(dx, dy, space_weight) in &self.space_kernel {
            let nx = (i64::from(x) + dx).clamp(0, max_x) as u32;
            let ny = (i64::from(y) + dy).clamp(0, max_y) as u32;
            let sample = input.get_pixel(nx, ny).0;

            let distance: usize = sample
                .iter()
                .zip(center.iter())
                .map(|(a, b)| usize::from(a.abs_diff(*b)))
                .sum();
            let weight = space_weight * self.color_weights[distance];

            for (sum, value) in sums.iter_mut().zip(sample.iter()) {
                *sum += weight * f32::from(*value);
            }
            weight_total += weight;
        }

        // The center tap always contributes weight 1.0, so the total is never zero.
        Rgb(sums.map(|sum| (sum / weight_total).round().clamp(0.0, 255.0) as u8))
    }
}

/// Convenience wrapper that builds a [`BilateralFilter`] and applies it once.
pub fn bilateral_filter(
    input: &RgbImage,
    diameter: i32,
    sigma_color: f64,
    sigma_space: f64,
) -> RgbImage {
    BilateralFilter::new(diameter, sigma_color, sigma_space).apply(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radius_follows_diameter_or_sigma_space() {
        assert_eq!(BilateralFilter::new(6, 75.0, 75.0).radius(), 3);
        assert_eq!(BilateralFilter::new(1, 75.0, 75.0).radius(), 1);
        assert_eq!(BilateralFilter::new(0, 75.0, 2.0).radius(), 3);
        assert_eq!(BilateralFilter::new(-1, 75.0, 0.0).radius(), 2);
    }

    #[test]
    fn uniform_image_is_unchanged() {
        let input = RgbImage::from_pixel(9, 7, Rgb([40, 120, 200]));
        let output = bilateral_filter(&input, 5, 30.0, 30.0);

        assert_eq!(output, input);
    }

    #[test]
    fn preserves_hard_edges_with_small_sigma_color() {
        let input = RgbImage::from_fn(8, 4, |x, _| {
            if x < 4 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) }
        });
        let output = bilateral_filter(&input, 5, 10.0, 50.0);

        assert_eq!(output.get_pixel(3, 2).0, [0, 0, 0]);
        assert_eq!(output.get_pixel(4, 2).0, [255, 255, 255]);
    }

    #[test]
    fn smooths_small_noise() {
        let mut input = RgbImage::from_pixel(5, 5, Rgb([100, 100, 100]));
        input.put_pixel(2, 2, Rgb([110, 110, 110]));
        let output = bilateral_filter(&input, 5, 75.0, 75.0);

        let center = output.get_pixel(2, 2).0[0];
        assert!(center > 100 && center < 110, "center was {center}");
    }
}
