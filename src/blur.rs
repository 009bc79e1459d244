use crate::grid::Grid;

// Fixed binomial coefficients used for small kernels when no sigma is given.
const SMALL_KERNELS: [&[f32]; 4] = [
    &[1.0],
    &[0.25, 0.5, 0.25],
    &[0.0625, 0.25, 0.375, 0.25, 0.0625],
    &[0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125],
];

/// 1D Gaussian kernel of odd length `size`, normalized to sum 1.
///
/// Sizes 1, 3, 5 and 7 use fixed binomial tables. Larger sizes derive
/// sigma from the size as `0.3 * ((size - 1) / 2 - 1) + 0.8`.
pub fn gaussian_kernel(size: usize) -> Vec<f32> {
    assert!(size % 2 == 1, "kernel size must be odd");
    if size <= 7 {
        return SMALL_KERNELS[size / 2].to_vec();
    }

    let sigma = 0.3 * ((size as f64 - 1.0) * 0.5 - 1.0) + 0.8;
    let scale = -0.5 / (sigma * sigma);
    let radius = (size / 2) as f64;
    let raw: Vec<f64> = (0..size)
        .map(|i| {
            let x = i as f64 - radius;
            (scale * x * x).exp()
        })
        .collect();
    let sum: f64 = raw.iter().sum();
    raw.iter().map(|&v| (v / sum) as f32).collect()
}

/// Mirror an out-of-range index back into `0..n` without repeating the edge pixel.
fn reflect_101(mut i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let last = n as isize - 1;
    while i < 0 || i > last {
        i = if i < 0 { -i } else { 2 * last - i };
    }
    i as usize
}

/// Separable Gaussian blur with a square `size` x `size` kernel.
pub fn gaussian_blur(src: &Grid<f32>, size: usize) -> Grid<f32> {
    let kernel = gaussian_kernel(size);
    let radius = (size / 2) as isize;
    let res = src.resolution();
    let (w, h) = (res.width(), res.height());
    let input = src.as_slice();

    let mut rows = vec![0.0f32; w * h];
    for y in 0..h {
        let row = &input[y * w..(y + 1) * w];
        for x in 0..w {
            let mut acc = 0.0f32;
            for (k, &weight) in kernel.iter().enumerate() {
                let sx = reflect_101(x as isize + k as isize - radius, w);
                acc += weight * row[sx];
            }
            rows[y * w + x] = acc;
        }
    }

    let mut out = vec![0.0f32; w * h];
    for y in 0..h {
        for (k, &weight) in kernel.iter().enumerate() {
            let sy = reflect_101(y as isize + k as isize - radius, h);
            if weight == 0.0 {
                continue;
            }
            let src_row = &rows[sy * w..(sy + 1) * w];
            let dst_row = &mut out[y * w..(y + 1) * w];
            for (d, &s) in dst_row.iter_mut().zip(src_row) {
                *d += weight * s;
            }
        }
    }

    Grid::from_vec(res, out)
}
