//! Joint and parameter counts of the SMPL topology.

/// Rotation joints of SMPL including the global orientation.
pub const JOINT_COUNT: usize = 24;

/// Joints produced by the body model (SMPL joints plus extra keypoints).
pub const KEYPOINT_COUNT: usize = 49;

/// Width of the 6D pose code (`JOINT_COUNT * 6`).
pub const POSE_DIM: usize = JOINT_COUNT * 6;

/// Width of the axis-angle pose (`JOINT_COUNT * 3`).
pub const POSE_AXIS_ANGLE_DIM: usize = JOINT_COUNT * 3;

/// Width of the shape coefficients.
pub const SHAPE_DIM: usize = 10;

/// Width of the weak-perspective camera `(scale, translation_x, translation_y)`.
pub const CAMERA_DIM: usize = 3;

/// Width of `theta`, i.e. camera, shape and axis-angle pose.
pub const THETA_DIM: usize = CAMERA_DIM + SHAPE_DIM + POSE_AXIS_ANGLE_DIM;

/// Vertices of the full SMPL mesh.
pub const VERTEX_COUNT: usize = 6890;

/// Selects the 14 evaluation joints from the 17 Human3.6M joints.
pub const H36M_TO_J14: [i32; 14] = [6, 5, 4, 1, 2, 3, 16, 15, 14, 11, 12, 13, 8, 10];

/// The pelvis among the 17 Human3.6M joints.
pub const H36M_PELVIS: usize = 0;
