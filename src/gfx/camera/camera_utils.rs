use cgmath::{Matrix, Matrix3, Matrix4, SquareMatrix};

/// Remaps OpenGL clip depth `[-1, 1]` onto the `[0, 1]` range wgpu expects.
///
/// `Matrix4::new` takes columns, so the depth terms sit in the third and
/// fourth columns.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Inverse-transpose of the upper 3x3 of `model`.
///
/// Falls back to the plain upper 3x3 when the model matrix is singular
/// (e.g. a zero scale axis), which keeps normals finite.
pub fn normal_matrix(model: Matrix4<f32>) -> Matrix3<f32> {
    let upper = Matrix3::from_cols(model.x.truncate(), model.y.truncate(), model.z.truncate());
    upper.invert().map(|inverse| inverse.transpose()).unwrap_or(upper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Vector3, Vector4};

    #[test]
    fn test_normal_matrix_undoes_non_uniform_scale() {
        let model = Matrix4::from_nonuniform_scale(2.0, 1.0, 1.0);
        let normal = normal_matrix(model);
        assert_eq!(normal * Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.5, 0.0, 0.0));
    }

    #[test]
    fn test_depth_remap_maps_near_to_zero() {
        let near = OPENGL_TO_WGPU_MATRIX * Vector4::new(0.0, 0.0, -1.0, 1.0);
        let far = OPENGL_TO_WGPU_MATRIX * Vector4::new(0.0, 0.0, 1.0, 1.0);
        assert_eq!(near.z, 0.0);
        assert_eq!(far.z, 1.0);
    }
}
