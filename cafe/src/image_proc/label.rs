//! Connected-component labeling of binary masks.

use log::debug;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Pixel adjacency used to decide whether two true pixels belong together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    /// Horizontal and vertical neighbours only.
    #[default]
    Four,
    /// Horizontal, vertical and diagonal neighbours.
    Eight,
}

impl Connectivity {
    fn neighbors(self) -> &'static [(isize, isize)] {
        const FOUR: [(isize, isize); 4] = [(-1, 0), (0, -1), (0, 1), (1, 0)];
        #[rustfmt::skip]
        const EIGHT: [(isize, isize); 8] = [
            (-1, -1), (-1, 0), (-1, 1),
            (0, -1),           (0, 1),
            (1, -1),  (1, 0),  (1, 1),
        ];
        match self {
            Connectivity::Four => &FOUR,
            Connectivity::Eight => &EIGHT,
        }
    }
}

/// Integer label image produced by [`label`].
///
/// `labels` has the extent of the source mask; 0 marks background and
/// `1..=count` identify the connected components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    pub labels: Array2<u32>,
    pub count: u32,
}

impl LabelMap {
    /// Pixel count per label, indexed by label (index 0 counts background).
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.count as usize + 1];
        for &l in self.labels.iter() {
            sizes[l as usize] += 1;
        }
        sizes
    }

    /// Mask of the pixels carrying `label`.
    pub fn mask_of(&self, label: u32) -> Array2<bool> {
        self.labels.mapv(|l| l == label && label != 0)
    }

    pub fn dim(&self) -> (usize, usize) {
        self.labels.dim()
    }
}

/// Find connected components in a binary mask
///
/// Components are discovered in raster order (row-major), so the component
/// containing the first true pixel of the scan receives label 1. Each
/// component is filled with an explicit stack.
///
/// # Arguments
///
/// * `mask` - Binary mask
/// * `connectivity` - Four- or eight-neighbour adjacency
///
/// # Returns
///
/// A [`LabelMap`] with consecutive labels starting at 1
pub fn label(mask: ArrayView2<bool>, connectivity: Connectivity) -> LabelMap {
    let (rows, cols) = mask.dim();
    let mut labels = Array2::zeros((rows, cols));
    let mut label_counter = 0u32;
    let neighbors = connectivity.neighbors();

    for i in 0..rows {
        for j in 0..cols {
            if !mask[[i, j]] || labels[[i, j]] != 0 {
                continue;
            }

            label_counter += 1;
            labels[[i, j]] = label_counter;
            let mut stack = vec![(i, j)];

            while let Some((y, x)) = stack.pop() {
                for &(dy, dx) in neighbors {
                    let ny = y as isize + dy;
                    let nx = x as isize + dx;
                    if ny < 0 || nx < 0 || ny >= rows as isize || nx >= cols as isize {
                        continue;
                    }
                    let (ny, nx) = (ny as usize, nx as usize);
                    if mask[[ny, nx]] && labels[[ny, nx]] == 0 {
                        labels[[ny, nx]] = label_counter;
                        stack.push((ny, nx));
                    }
                }
            }
        }
    }

    debug!("Labeled {label_counter} components ({connectivity:?}-connected)");

    LabelMap {
        labels,
        count: label_counter,
    }
}
