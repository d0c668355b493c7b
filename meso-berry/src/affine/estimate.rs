//! 由点对应关系做最小二乘仿射估计.

// 做法同单应性 DLT: 先将两组点各自归一化 (质心移至原点, 平均距离为 sqrt(2)),
// 在归一化坐标下求解, 再反归一化.

use super::AffineTransform;
use crate::{MesoError, MesoResult};
use nalgebra::{DMatrix, DVector};
use ndarray::ArrayView2;

/// 仿射估计至少需要的点对数.
const MIN_POINTS: usize = 3;

/// 最小奇异值与最大奇异值之比低于该值时视为退化 (如所有点共线).
const RANK_TOL: f64 = 1e-9;

/// 给定对应点集 `src` 和 `dst` (形状均为 `(N, 2)`, `src[i]` 与 `dst[i]` 对应),
/// 估计将 `src` 映射到 `dst` 的仿射变换.
///
/// 对全部点同时最小化欧氏残差平方和 (而非按坐标轴分别拟合).
///
/// 以下情况返回 `DataShape` 错误:
///
/// 1. 任一点集不是二维点 (列数不为 2);
/// 2. 两个点集长度不一致;
/// 3. 点数少于 3, 或点集退化 (共线) 导致解不唯一;
/// 4. 任一坐标不是有限值 (NaN 或无穷).
pub fn estimate(src: ArrayView2<f64>, dst: ArrayView2<f64>) -> MesoResult<AffineTransform> {
    let (n, k_src) = src.dim();
    let (n_dst, k_dst) = dst.dim();
    if k_src != 2 || k_dst != 2 {
        return Err(MesoError::shape(format!(
            "points must be 2-dimensional, got {k_src} (src) and {k_dst} (dst) columns"
        )));
    }
    if n != n_dst {
        return Err(MesoError::shape(format!(
            "src and dst must have the same length, got {n} and {n_dst}"
        )));
    }
    if n < MIN_POINTS {
        return Err(MesoError::shape(format!(
            "at least {MIN_POINTS} correspondences are required, got {n}"
        )));
    }

    if let Some(v) = src.iter().chain(dst.iter()).find(|v| !v.is_finite()) {
        return Err(MesoError::shape(format!(
            "correspondences must have finite coordinates, got {v}"
        )));
    }

    let src: Vec<(f64, f64)> = src.outer_iter().map(|r| (r[0], r[1])).collect();
    let dst: Vec<(f64, f64)> = dst.outer_iter().map(|r| (r[0], r[1])).collect();

    let norm_src = normalizer(&src);
    let norm_dst = normalizer(&dst);

    // 2N x 6:
    //   row 2i:   [ x  y  1  0  0  0 ] -> x'
    //   row 2i+1: [ 0  0  0  x  y  1 ] -> y'
    let mut a = DMatrix::<f64>::zeros(2 * n, 6);
    let mut b = DVector::<f64>::zeros(2 * n);
    for (i, (&s, &d)) in src.iter().zip(dst.iter()).enumerate() {
        let (sx, sy) = norm_src.apply(s);
        let (dx, dy) = norm_dst.apply(d);
        a[(2 * i, 0)] = sx;
        a[(2 * i, 1)] = sy;
        a[(2 * i, 2)] = 1.0;
        a[(2 * i + 1, 3)] = sx;
        a[(2 * i + 1, 4)] = sy;
        a[(2 * i + 1, 5)] = 1.0;
        b[2 * i] = dx;
        b[2 * i + 1] = dy;
    }

    let svd = a.svd(true, true);
    let sv = &svd.singular_values;
    let max_sv = sv.iter().copied().fold(0.0_f64, f64::max);
    let min_sv = sv.iter().copied().fold(f64::INFINITY, f64::min);
    if !(max_sv > 0.0) || min_sv / max_sv < RANK_TOL {
        return Err(MesoError::shape(
            "degenerate correspondences (points are collinear or coincident)",
        ));
    }

    let theta = svd
        .solve(&b, RANK_TOL * max_sv)
        .map_err(|e| MesoError::shape(format!("least-squares solve failed: {e}")))?;
    let normalized = AffineTransform::from_components([
        theta[0], theta[1], theta[2], theta[3], theta[4], theta[5],
    ]);

    // 归一化坐标下的解 -> 原坐标: 先归一化 src, 再施加解, 最后反归一化 dst.
    let denorm_dst = norm_dst.invert()?;
    Ok(super::compose([&norm_src, &normalized, &denorm_dst]))
}

/// 平移质心至原点并缩放使平均距离为 sqrt(2) 的相似变换.
fn normalizer(pts: &[(f64, f64)]) -> AffineTransform {
    let n = pts.len() as f64;
    let cx = pts.iter().map(|p| p.0).sum::<f64>() / n;
    let cy = pts.iter().map(|p| p.1).sum::<f64>() / n;
    let mean_dist = pts
        .iter()
        .map(|&(x, y)| ((x - cx).powi(2) + (y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    let s = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    AffineTransform::from_compact([[s, 0.0, -s * cx], [0.0, s, -s * cy]])
}

#[cfg(test)]
mod tests {
    use super::estimate;
    use crate::affine::AffineTransform;
    use crate::MesoError;
    use ndarray::{array, Array2};

    #[test]
    fn test_estimate_identity() {
        let p = array![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [3.5, 2.0], [102.0, 148.0]];
        let t = estimate(p.view(), p.view()).unwrap();
        assert!(t.approx_eq(&AffineTransform::identity(), 1e-9));
    }

    #[test]
    fn test_estimate_translation() {
        let src = array![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        let dst = array![[1.0, 1.0], [2.0, 1.0], [1.0, 2.0]];
        let t = estimate(src.view(), dst.view()).unwrap();
        let expected = AffineTransform::from_compact([[1.0, 0.0, 1.0], [0.0, 1.0, 1.0]]);
        assert!(t.approx_eq(&expected, 1e-9));
    }

    /// 由已知变换生成的点集应能恢复原变换.
    #[test]
    fn test_estimate_recovers_known() {
        let truth = AffineTransform::from_compact([[0.92, 0.11, 31.0], [-0.07, 1.04, -12.5]]);
        let src = array![
            [102.0, 148.0],
            [166.0, 88.0],
            [214.0, 454.0],
            [256.0, 88.0],
            [256.0, 256.0],
            [256.0, 428.0],
        ];
        let dst = truth.apply_to_points(src.view()).unwrap();
        let t = estimate(src.view(), dst.view()).unwrap();
        assert!(t.approx_eq(&truth, 1e-8));
    }

    /// 带噪声时, 解应使残差平方和不大于真值的残差平方和.
    #[test]
    fn test_estimate_least_squares() {
        let src = array![[0.0, 0.0], [10.0, 0.0], [0.0, 10.0], [10.0, 10.0]];
        let dst = array![[0.1, 0.0], [10.0, -0.1], [0.0, 10.1], [9.9, 10.0]];
        let t = estimate(src.view(), dst.view()).unwrap();

        let sse = |t: &AffineTransform| -> f64 {
            let w = t.apply_to_points(src.view()).unwrap();
            (&w - &dst).iter().map(|v| v * v).sum()
        };
        assert!(sse(&t) <= sse(&AffineTransform::identity()) + 1e-12);
    }

    #[test]
    fn test_estimate_shape_errors() {
        let a = array![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        let b = array![[0.0, 0.0], [1.0, 0.0]];
        assert!(matches!(
            estimate(a.view(), b.view()),
            Err(MesoError::DataShape(_))
        ));

        let c = Array2::<f64>::zeros((3, 3));
        assert!(matches!(
            estimate(a.view(), c.view()),
            Err(MesoError::DataShape(_))
        ));

        assert!(matches!(
            estimate(b.view(), b.view()),
            Err(MesoError::DataShape(_))
        ));
    }

    #[test]
    fn test_estimate_collinear() {
        let a = array![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
        assert!(matches!(
            estimate(a.view(), a.view()),
            Err(MesoError::DataShape(_))
        ));
    }

    #[test]
    fn test_estimate_non_finite() {
        let src = array![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [3.0, 4.0]];
        let mut dst = src.clone();
        dst[(2, 0)] = f64::NAN;
        assert!(matches!(
            estimate(src.view(), dst.view()),
            Err(MesoError::DataShape(_))
        ));
        dst[(2, 0)] = f64::INFINITY;
        assert!(matches!(
            estimate(dst.view(), src.view()),
            Err(MesoError::DataShape(_))
        ));
    }
}
