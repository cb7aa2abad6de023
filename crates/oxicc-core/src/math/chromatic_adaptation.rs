//! Chromatic Adaptation Transforms
//!
//! Convert XYZ values from one white point to another by scaling in a cone
//! response space. Bradford is the ICC default; the "wrong von Kries"
//! transform some older profiles were built with is [`AdaptationMethod::XyzScaling`].
//!
//! References:
//! - ICC.1:2022 Annex E
//! - Lindbloom: http://www.brucelindbloom.com/index.html?Eqn_ChromAdapt.html

use serde::{Deserialize, Serialize};

use super::Matrix3x3;
use crate::icc::types::XyzNumber;

/// Cone space used for white point adaptation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AdaptationMethod {
    /// Bradford adaptation (ICC default)
    #[default]
    Bradford,
    VonKries,
    /// Scaling directly in XYZ ("wrong von Kries")
    XyzScaling,
    /// No adaptation (identity)
    None,
}

/// Bradford matrix: XYZ → LMS (cone response)
pub const BRADFORD: Matrix3x3 = Matrix3x3::new([
    [0.8951000, 0.2664000, -0.1614000],
    [-0.7502000, 1.7135000, 0.0367000],
    [0.0389000, -0.0685000, 1.0296000],
]);

/// Von Kries matrix: XYZ → LMS
pub const VON_KRIES: Matrix3x3 = Matrix3x3::new([
    [0.4002400, 0.7076000, -0.0808100],
    [-0.2263000, 1.1653200, 0.0457000],
    [0.0000000, 0.0000000, 0.9182200],
]);

impl AdaptationMethod {
    /// XYZ to cone space matrix
    pub fn cone_matrix(self) -> Matrix3x3 {
        match self {
            Self::Bradford => BRADFORD,
            Self::VonKries => VON_KRIES,
            Self::XyzScaling | Self::None => Matrix3x3::identity(),
        }
    }
}

/// Adaptation matrix for an arbitrary cone space: `M^-1 × S × M`.
///
/// Returns None when the cone matrix is singular. The result maps
/// `src_white` onto `dst_white`: `XYZ_dst = result × XYZ_src`.
pub fn adaptation_with_cone(
    cone: &Matrix3x3,
    src_white: XyzNumber,
    dst_white: XyzNumber,
) -> Option<Matrix3x3> {
    let cone_inv = cone.inverse()?;
    let src = cone.multiply_vec(src_white.to_array());
    let dst = cone.multiply_vec(dst_white.to_array());
    let ratio = |i: usize| {
        if src[i].abs() > 1e-10 {
            dst[i] / src[i]
        } else {
            1.0
        }
    };
    let scale = Matrix3x3::diagonal(ratio(0), ratio(1), ratio(2));
    Some(cone_inv.multiply(&scale.multiply(cone)))
}

/// Adaptation matrix from `src_white` to `dst_white`
pub fn adaptation_matrix(
    src_white: XyzNumber,
    dst_white: XyzNumber,
    method: AdaptationMethod,
) -> Matrix3x3 {
    if method == AdaptationMethod::None {
        return Matrix3x3::identity();
    }
    adaptation_with_cone(&method.cone_matrix(), src_white, dst_white)
        .unwrap_or_else(Matrix3x3::identity)
}

/// Adapt an XYZ color from one white point to another
#[inline]
pub fn adapt_xyz(
    xyz: XyzNumber,
    src_white: XyzNumber,
    dst_white: XyzNumber,
    method: AdaptationMethod,
) -> XyzNumber {
    adaptation_matrix(src_white, dst_white, method).apply(xyz)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icc::types::D50;

    const D65: XyzNumber = XyzNumber::new(0.95047, 1.0, 1.08883);

    /// Pre-computed D65 → D50 Bradford matrix
    const D65_TO_D50_BRADFORD: Matrix3x3 = Matrix3x3::new([
        [1.0478112, 0.0228866, -0.0501270],
        [0.0295424, 0.9904844, -0.0170491],
        [-0.0092345, 0.0150436, 0.7521316],
    ]);

    #[test]
    fn test_identity_adaptation() {
        let m = adaptation_matrix(D65, D65, AdaptationMethod::Bradford);
        assert!(m.is_identity(1e-9));
        assert!(adaptation_matrix(D65, D50, AdaptationMethod::None).is_identity(0.0));
    }

    #[test]
    fn test_d65_to_d50() {
        let m = adaptation_matrix(D65, D50, AdaptationMethod::Bradford);
        assert!(
            m.approx_eq(&D65_TO_D50_BRADFORD, 1e-2),
            "D65→D50 matrix mismatch: {m:?}"
        );
    }

    #[test]
    fn test_white_maps_to_white() {
        for method in [
            AdaptationMethod::Bradford,
            AdaptationMethod::VonKries,
            AdaptationMethod::XyzScaling,
        ] {
            let adapted = adapt_xyz(D65, D65, D50, method);
            assert!(adapted.approx_eq(&D50, 1e-9), "{method:?}: {adapted:?}");
        }
    }

    #[test]
    fn test_xyz_scaling_is_diagonal() {
        let m = adaptation_matrix(D65, D50, AdaptationMethod::XyzScaling);
        assert!(m.m[0][1].abs() < 1e-12);
        assert!(m.m[1][2].abs() < 1e-12);
        assert!(m.m[2][0].abs() < 1e-12);
        assert!((m.m[0][0] - D50.x / D65.x).abs() < 1e-12);
    }

    #[test]
    fn test_round_trip() {
        let there = adaptation_matrix(D65, D50, AdaptationMethod::Bradford);
        let back = adaptation_matrix(D50, D65, AdaptationMethod::Bradford);
        assert!((there * back).is_identity(1e-9));
    }

    #[test]
    fn test_singular_cone() {
        assert!(adaptation_with_cone(&Matrix3x3::zero(), D65, D50).is_none());
    }
}
