//! Keypoint sets and the motion normalisation applied between frames.

use crate::error::{MediaError, MediaResult};

/// 2x2 matrix, row-major.
pub type Mat2 = [[f32; 2]; 2];

pub const IDENTITY: Mat2 = [[1.0, 0.0], [0.0, 1.0]];

/// Keypoints detected on one frame.
///
/// Values are in normalised image coordinates (`[-1, 1]`). Each keypoint
/// carries a local affine jacobian; models without jacobian estimation use
/// the identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Keypoints {
    pub value: Vec<[f32; 2]>,
    pub jacobian: Vec<Mat2>,
}

impl Keypoints {
    /// Keypoints with identity jacobians.
    pub fn from_values(value: Vec<[f32; 2]>) -> Self {
        let jacobian = vec![IDENTITY; value.len()];
        Self { value, jacobian }
    }

    /// Build from flat network outputs (`[K*2]` and optionally `[K*4]`).
    pub fn from_flat(value: &[f32], jacobian: Option<&[f32]>) -> MediaResult<Self> {
        if value.len() % 2 != 0 {
            return Err(MediaError::inference(format!(
                "keypoint tensor has odd length {}",
                value.len()
            )));
        }
        let points: Vec<[f32; 2]> = value.chunks_exact(2).map(|p| [p[0], p[1]]).collect();

        let jacobian = match jacobian {
            Some(flat) => {
                if flat.len() != points.len() * 4 {
                    return Err(MediaError::inference(format!(
                        "jacobian tensor has {} values for {} keypoints",
                        flat.len(),
                        points.len()
                    )));
                }
                flat.chunks_exact(4)
                    .map(|m| [[m[0], m[1]], [m[2], m[3]]])
                    .collect()
            }
            None => vec![IDENTITY; points.len()],
        };

        Ok(Self {
            value: points,
            jacobian,
        })
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn flat_values(&self) -> Vec<f32> {
        self.value.iter().flat_map(|p| [p[0], p[1]]).collect()
    }

    pub fn flat_jacobians(&self) -> Vec<f32> {
        self.jacobian
            .iter()
            .flat_map(|m| [m[0][0], m[0][1], m[1][0], m[1][1]])
            .collect()
    }
}

/// Area of the convex hull around `points`.
///
/// Fewer than three points, or collinear points, have zero area.
pub fn hull_area(points: &[[f32; 2]]) -> f32 {
    let mut pts: Vec<[f64; 2]> = points
        .iter()
        .map(|p| [p[0] as f64, p[1] as f64])
        .collect();
    if pts.len() < 3 {
        return 0.0;
    }
    pts.sort_by(|a, b| a[0].total_cmp(&b[0]).then(a[1].total_cmp(&b[1])));
    pts.dedup();

    fn cross(o: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
        (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
    }

    // Andrew's monotone chain
    let mut hull: Vec<[f64; 2]> = Vec::with_capacity(pts.len() * 2);
    for &p in &pts {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower_len = hull.len() + 1;
    for &p in pts.iter().rev().skip(1) {
        while hull.len() >= lower_len
            && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0
        {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();

    if hull.len() < 3 {
        return 0.0;
    }

    // Shoelace
    let twice_area: f64 = hull
        .iter()
        .zip(hull.iter().cycle().skip(1))
        .map(|(a, b)| a[0] * b[1] - b[0] * a[1])
        .sum();
    (twice_area.abs() / 2.0) as f32
}

pub fn mat_mul(a: &Mat2, b: &Mat2) -> Mat2 {
    [
        [
            a[0][0] * b[0][0] + a[0][1] * b[1][0],
            a[0][0] * b[0][1] + a[0][1] * b[1][1],
        ],
        [
            a[1][0] * b[0][0] + a[1][1] * b[1][0],
            a[1][0] * b[0][1] + a[1][1] * b[1][1],
        ],
    ]
}

pub fn mat_inverse(m: &Mat2) -> MediaResult<Mat2> {
    let det = m[0][0] * m[1][1] - m[0][1] * m[1][0];
    if det.abs() < f32::EPSILON || !det.is_finite() {
        return Err(MediaError::inference("singular keypoint jacobian"));
    }
    let inv = 1.0 / det;
    Ok([
        [m[1][1] * inv, -m[0][1] * inv],
        [-m[1][0] * inv, m[0][0] * inv],
    ])
}

/// Motion scale between the source face and the first driving face.
///
/// Falls back to 1 when the driving hull is degenerate.
pub fn movement_scale(kp_source: &Keypoints, kp_initial: &Keypoints) -> f32 {
    let driving_area = hull_area(&kp_initial.value);
    if driving_area <= f32::EPSILON {
        return 1.0;
    }
    hull_area(&kp_source.value).sqrt() / driving_area.sqrt()
}

/// Map driving keypoints onto the source face.
///
/// With `relative`, the displacement of `kp_driving` from `kp_initial` is
/// applied to `kp_source` (scaled by hull area when
/// `adapt_movement_scale`), and jacobians are composed as
/// `(J_driving * inv(J_initial)) * J_source`. Otherwise the driving
/// keypoints are used as they are.
pub fn normalize_keypoints(
    kp_source: &Keypoints,
    kp_driving: &Keypoints,
    kp_initial: &Keypoints,
    relative: bool,
    adapt_movement_scale: bool,
) -> MediaResult<Keypoints> {
    if !relative {
        return Ok(kp_driving.clone());
    }

    let n = kp_driving.len();
    if kp_source.len() != n || kp_initial.len() != n {
        return Err(MediaError::inference(format!(
            "keypoint count mismatch: source {}, driving {}, initial {}",
            kp_source.len(),
            n,
            kp_initial.len()
        )));
    }

    let scale = if adapt_movement_scale {
        movement_scale(kp_source, kp_initial)
    } else {
        1.0
    };

    let value = (0..n)
        .map(|k| {
            let d = kp_driving.value[k];
            let i = kp_initial.value[k];
            let s = kp_source.value[k];
            [(d[0] - i[0]) * scale + s[0], (d[1] - i[1]) * scale + s[1]]
        })
        .collect();

    let jacobian = (0..n)
        .map(|k| {
            let diff = mat_mul(&kp_driving.jacobian[k], &mat_inverse(&kp_initial.jacobian[k])?);
            Ok(mat_mul(&diff, &kp_source.jacobian[k]))
        })
        .collect::<MediaResult<Vec<_>>>()?;

    Ok(Keypoints { value, jacobian })
}
