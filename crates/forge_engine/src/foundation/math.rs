//! Math types and helpers built on `nalgebra`.
//!
//! The engine standardizes on `f32` throughout. These aliases keep call
//! sites short and make it possible to swap the backing library in one
//! place if that ever becomes necessary.

/// 2D vector of `f32`.
pub type Vec2 = nalgebra::Vector2<f32>;
/// 3D vector of `f32`.
pub type Vec3 = nalgebra::Vector3<f32>;
/// 4D vector of `f32`.
pub type Vec4 = nalgebra::Vector4<f32>;
/// 4x4 matrix of `f32`, column-major storage.
pub type Mat4 = nalgebra::Matrix4<f32>;
/// 3D point of `f32`.
pub type Point3 = nalgebra::Point3<f32>;

/// Camera and transform constructors tuned for Vulkan conventions.
///
/// Vulkan clip space differs from OpenGL: depth spans `[0, 1]` rather than
/// `[-1, 1]`, and the Y axis points down. [`Mat4Ext::perspective`] bakes
/// both conventions in so shaders never need a correction matrix.
pub trait Mat4Ext {
    /// Right-handed perspective projection with `[0, 1]` depth and the
    /// Y flip Vulkan expects. `fovy` is the vertical field of view in
    /// radians.
    fn perspective(fovy: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Right-handed view matrix looking from `eye` toward `target`.
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;

    /// Rotation about the Z axis by `angle` radians.
    fn rotation_z(angle: f32) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn perspective(fovy: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        let f = 1.0 / (fovy * 0.5).tan();
        // Row-major constructor; nalgebra stores column-major internally.
        Mat4::new(
            f / aspect,
            0.0,
            0.0,
            0.0,
            0.0,
            -f,
            0.0,
            0.0,
            0.0,
            0.0,
            far / (near - far),
            (near * far) / (near - far),
            0.0,
            0.0,
            -1.0,
            0.0,
        )
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        Mat4::look_at_rh(&Point3::from(eye), &Point3::from(target), &up)
    }

    fn rotation_z(angle: f32) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::z_axis(), angle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Projects a homogeneous point and performs the perspective divide.
    fn project(m: &Mat4, p: Vec4) -> Vec3 {
        let clip = m * p;
        Vec3::new(clip.x / clip.w, clip.y / clip.w, clip.z / clip.w)
    }

    #[test]
    fn perspective_maps_near_plane_to_zero_depth() {
        let proj = Mat4::perspective(std::f32::consts::FRAC_PI_4, 16.0 / 9.0, 0.1, 100.0);
        let ndc = project(&proj, Vec4::new(0.0, 0.0, -0.1, 1.0));
        assert_relative_eq!(ndc.z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn perspective_maps_far_plane_to_unit_depth() {
        let proj = Mat4::perspective(std::f32::consts::FRAC_PI_4, 16.0 / 9.0, 0.1, 100.0);
        let ndc = project(&proj, Vec4::new(0.0, 0.0, -100.0, 1.0));
        assert_relative_eq!(ndc.z, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn perspective_flips_y() {
        let proj = Mat4::perspective(std::f32::consts::FRAC_PI_4, 1.0, 0.1, 100.0);
        let ndc = project(&proj, Vec4::new(0.0, 1.0, -2.0, 1.0));
        assert!(ndc.y < 0.0, "point above the axis must land below it in clip space");
    }

    #[test]
    fn look_at_moves_target_onto_negative_z() {
        let view = Mat4::look_at(
            Vec3::new(0.0, 0.0, 2.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        );
        let p = view.transform_point(&Point3::new(0.0, 0.0, 0.0));
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(p.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(p.z, -2.0, epsilon = 1e-6);
    }

    #[test]
    fn rotation_z_quarter_turn_maps_x_to_y() {
        let rot = Mat4::rotation_z(std::f32::consts::FRAC_PI_2);
        let p = rot.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-6);
    }
}
