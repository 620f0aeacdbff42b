//! Separable smoothing filters used for local (adaptive) thresholding.
//!
//! Both filters treat the image border with mirror reflection
//! (`d c b a | a b c d | d c b a`), so a flat image stays flat and no
//! artificial dark rim appears around the frame.

use ndarray::{Array2, ArrayView2, Axis};

/// Map an out-of-range index back into `0..len` by mirror reflection.
fn reflect_index(index: isize, len: usize) -> usize {
    let len = len as isize;
    let period = 2 * len;
    let m = index.rem_euclid(period);
    if m < len {
        m as usize
    } else {
        (period - 1 - m) as usize
    }
}

/// Correlate every row (axis 1) or every column (axis 0) with a 1D kernel.
fn correlate_axis(image: ArrayView2<f64>, kernel: &[f64], axis: Axis) -> Array2<f64> {
    let half = (kernel.len() / 2) as isize;
    let (rows, cols) = image.dim();
    let mut output = Array2::zeros((rows, cols));

    for ((r, c), out) in output.indexed_iter_mut() {
        let mut acc = 0.0;
        for (k, &weight) in kernel.iter().enumerate() {
            let offset = k as isize - half;
            let sample = if axis == Axis(1) {
                image[[r, reflect_index(c as isize + offset, cols)]]
            } else {
                image[[reflect_index(r as isize + offset, rows), c]]
            };
            acc += weight * sample;
        }
        *out = acc;
    }

    output
}

fn separable(image: ArrayView2<f64>, kernel: &[f64]) -> Array2<f64> {
    let horizontal = correlate_axis(image, kernel, Axis(1));
    correlate_axis(horizontal.view(), kernel, Axis(0))
}

/// Uniform (box/mean) filter with an odd window of `size` pixels per side.
pub fn uniform_filter(image: ArrayView2<f64>, size: usize) -> Array2<f64> {
    let size = size.max(1);
    let kernel = vec![1.0 / size as f64; size];
    separable(image, &kernel)
}

/// Normalized 1D Gaussian kernel truncated at four standard deviations.
pub fn gaussian_kernel_1d(sigma: f64) -> Vec<f64> {
    if sigma <= 0.0 {
        return vec![1.0];
    }
    let radius = (4.0 * sigma + 0.5) as isize;
    let two_sigma_sq = 2.0 * sigma * sigma;
    let mut kernel: Vec<f64> = (-radius..=radius)
        .map(|x| (-((x * x) as f64) / two_sigma_sq).exp())
        .collect();
    let total: f64 = kernel.iter().sum();
    kernel.iter_mut().for_each(|w| *w /= total);
    kernel
}

/// Gaussian-weighted local mean.
pub fn gaussian_filter(image: ArrayView2<f64>, sigma: f64) -> Array2<f64> {
    separable(image, &gaussian_kernel_1d(sigma))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr2;

    #[test]
    fn test_reflect_index() {
        assert_eq!(reflect_index(-1, 4), 0);
        assert_eq!(reflect_index(-2, 4), 1);
        assert_eq!(reflect_index(4, 4), 3);
        assert_eq!(reflect_index(5, 4), 2);
        assert_eq!(reflect_index(2, 4), 2);
        // Windows wider than the image keep bouncing
        assert_eq!(reflect_index(9, 4), 1);
    }

    #[test]
    fn test_uniform_filter_constant_image() {
        let image = Array2::from_elem((7, 9), 42.0);
        let filtered = uniform_filter(image.view(), 5);
        for &v in filtered.iter() {
            assert_relative_eq!(v, 42.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_uniform_filter_averages_window() {
        let image = arr2(&[[0.0, 0.0, 0.0], [0.0, 9.0, 0.0], [0.0, 0.0, 0.0]]);
        let filtered = uniform_filter(image.view(), 3);
        assert_relative_eq!(filtered[[1, 1]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_gaussian_kernel_is_normalized_and_symmetric() {
        let kernel = gaussian_kernel_1d(2.0);
        assert_eq!(kernel.len(), 17);
        assert_relative_eq!(kernel.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        for i in 0..kernel.len() / 2 {
            assert_relative_eq!(kernel[i], kernel[kernel.len() - 1 - i], epsilon = 1e-15);
        }
    }

    #[test]
    fn test_gaussian_filter_preserves_total_on_interior_spike() {
        let mut image = Array2::zeros((21, 21));
        image[[10, 10]] = 100.0;
        let filtered = gaussian_filter(image.view(), 1.0);
        assert_relative_eq!(filtered.sum(), 100.0, epsilon = 1e-9);
        assert!(filtered[[10, 10]] > filtered[[10, 11]]);
    }
}
