//! 二维网格缩放, 与 OpenCV `cv2.resize` 的 `INTER_NEAREST` / `INTER_CUBIC` 语义一致.
//!
//! 既有归档由 OpenCV 生成, 这里按同样的采样位置和系数计算, 以保证新旧数据可以混用.

use ndarray::{Array2, ArrayView2};

/// 插值方法.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Interpolation {
    /// 最近邻. `src = floor(dst * src_len / dst_len)`.
    Nearest,

    /// 双三次. 像素中心对齐 (半像素偏移), 系数 `a = -0.75`, 边界复制.
    Bicubic,
}

/// 双三次插值的系数 `a`.
const CUBIC_A: f64 = -0.75;

/// 将 `src` 缩放到 `(h, w)`.
///
/// `src` 与目标尺寸都不能为空, 否则 panic. 调用方负责检查.
pub fn resize(src: ArrayView2<f64>, (h, w): (usize, usize), interp: Interpolation) -> Array2<f64> {
    match interp {
        Interpolation::Nearest => resize_nearest(src, (h, w)),
        Interpolation::Bicubic => resize_bicubic(src, (h, w)),
    }
}

/// 最近邻缩放. 适用于任意可复制元素.
pub fn resize_nearest<T: Copy>(src: ArrayView2<T>, (h, w): (usize, usize)) -> Array2<T> {
    let (sh, sw) = src.dim();
    assert!(sh > 0 && sw > 0 && h > 0 && w > 0, "empty grid");
    let rows: Vec<usize> = (0..h).map(|d| nearest_index(d, sh, h)).collect();
    let cols: Vec<usize> = (0..w).map(|d| nearest_index(d, sw, w)).collect();
    Array2::from_shape_fn((h, w), |(y, x)| src[(rows[y], cols[x])])
}

#[inline]
fn nearest_index(dst: usize, src_len: usize, dst_len: usize) -> usize {
    let scale = src_len as f64 / dst_len as f64;
    ((dst as f64 * scale).floor() as usize).min(src_len - 1)
}

/// 双三次缩放. 先水平方向, 后竖直方向.
pub fn resize_bicubic(src: ArrayView2<f64>, (h, w): (usize, usize)) -> Array2<f64> {
    let (sh, sw) = src.dim();
    assert!(sh > 0 && sw > 0 && h > 0 && w > 0, "empty grid");
    let xs = cubic_taps(sw, w);
    let ys = cubic_taps(sh, h);

    let horizontal = Array2::from_shape_fn((sh, w), |(y, x)| {
        let (idx, coef) = &xs[x];
        (0..4).map(|k| src[(y, idx[k])] * coef[k]).sum::<f64>()
    });
    Array2::from_shape_fn((h, w), |(y, x)| {
        let (idx, coef) = &ys[y];
        (0..4).map(|k| horizontal[(idx[k], x)] * coef[k]).sum::<f64>()
    })
}

/// 每个目标位置的 4 个源索引 (已钳制到边界) 与对应系数.
fn cubic_taps(src_len: usize, dst_len: usize) -> Vec<([usize; 4], [f64; 4])> {
    let scale = src_len as f64 / dst_len as f64;
    let last = src_len as isize - 1;
    (0..dst_len)
        .map(|d| {
            let f = (d as f64 + 0.5) * scale - 0.5;
            let s = f.floor();
            let t = f - s;
            let s = s as isize;
            let idx = [-1, 0, 1, 2].map(|k: isize| (s + k).clamp(0, last) as usize);
            (idx, cubic_coefficients(t))
        })
        .collect()
}

/// `t` 处的 4 个三次卷积系数, 对应偏移 -1, 0, 1, 2.
fn cubic_coefficients(t: f64) -> [f64; 4] {
    let a = CUBIC_A;
    let c0 = ((a * (t + 1.0) - 5.0 * a) * (t + 1.0) + 8.0 * a) * (t + 1.0) - 4.0 * a;
    let c1 = ((a + 2.0) * t - (a + 3.0)) * t * t + 1.0;
    let u = 1.0 - t;
    let c2 = ((a + 2.0) * u - (a + 3.0)) * u * u + 1.0;
    [c0, c1, c2, 1.0 - c0 - c1 - c2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_nearest_indices() {
        // 3 -> 5: floor(d * 0.6)
        let src = array![[0u8, 1, 2]];
        let out = resize_nearest(src.view(), (1, 5));
        assert_eq!(out, array![[0u8, 0, 1, 1, 2]]);

        // 4 -> 2: floor(d * 2)
        let src = array![[1u8], [2], [3], [4]];
        assert_eq!(resize_nearest(src.view(), (2, 1)), array![[1u8], [3]]);
    }

    #[test]
    fn test_nearest_keeps_value_set() {
        let src = Array2::from_shape_fn((7, 5), |(y, x)| u8::from((y * 5 + x) % 3 == 0));
        let out = resize_nearest(src.view(), (16, 16));
        assert!(out.iter().all(|&v| v == 0 || v == 1));
        assert!(out.iter().any(|&v| v == 1));
    }

    #[test]
    fn test_cubic_coefficients() {
        let c = cubic_coefficients(0.0);
        assert!((c[1] - 1.0).abs() < 1e-12);
        assert!(c[0].abs() < 1e-12 && c[2].abs() < 1e-12 && c[3].abs() < 1e-12);

        let c = cubic_coefficients(0.5);
        assert!((c.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((c[0] - c[3]).abs() < 1e-12);
        assert!((c[0] + 0.09375).abs() < 1e-12);
        assert!((c[1] - 0.59375).abs() < 1e-12);
    }

    #[test]
    fn test_bicubic_identity_and_constant() {
        let src = Array2::from_shape_fn((4, 6), |(y, x)| (y * 10 + x) as f64);
        let same = resize_bicubic(src.view(), (4, 6));
        assert!(same.iter().zip(src.iter()).all(|(a, b)| (a - b).abs() < 1e-9));

        let flat = Array2::from_elem((5, 3), 42.0);
        let out = resize(flat.view(), (8, 8), Interpolation::Bicubic);
        assert_eq!(out.dim(), (8, 8));
        assert!(out.iter().all(|v| (v - 42.0).abs() < 1e-9));
    }

    #[test]
    fn test_bicubic_upscale_2x() {
        // 2 -> 4: 采样位置 -0.25, 0.25, 0.75, 1.25.
        let src = array![[0.0, 100.0]];
        let out = resize_bicubic(src.view(), (1, 4));
        assert!((out[(0, 0)] - 0.0).abs() < 1e-9 || out[(0, 0)] < 0.0);
        assert!(out[(0, 1)] > 0.0 && out[(0, 1)] < 50.0);
        assert!((out[(0, 1)] + out[(0, 2)] - 100.0).abs() < 1e-9);
        assert!(out[(0, 3)] >= 100.0 - 1e-9);
    }
}
