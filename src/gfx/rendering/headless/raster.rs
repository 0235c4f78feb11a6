//! Triangle rasterisation into an f32 framebuffer
//!
//! Counter-clockwise triangles are front facing; the rest are culled. Pixel
//! centres on a shared edge belong to exactly one triangle (top-left rule),
//! so additive passes never double count a pixel. Attributes are
//! interpolated perspective-correctly; depth is interpolated linearly in
//! screen space, as the hardware does.

use cgmath::{InnerSpace, Vector2, Vector3, Vector4};

use crate::gfx::rendering::device::{BlendMode, RenderState};

/// Colour and depth planes, row 0 at the top
#[derive(Debug, Clone)]
pub struct Framebuffer {
    width: u32,
    height: u32,
    color: Vec<[f32; 4]>,
    depth: Vec<f32>,
}

impl Framebuffer {
    pub fn new(width: u32, height: u32, clear: [f32; 4]) -> Self {
        let len = (width * height) as usize;
        Self {
            width,
            height,
            color: vec![clear; len],
            depth: vec![1.0; len],
        }
    }

    pub fn clear(&mut self, color: [f32; 4]) {
        self.color.fill(color);
        self.depth.fill(1.0);
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        self.color[(y * self.width + x) as usize]
    }

    pub fn depth(&self, x: u32, y: u32) -> f32 {
        self.depth[(y * self.width + x) as usize]
    }

    pub fn pixels(&self) -> &[[f32; 4]] {
        &self.color
    }
}

/// Output of the vertex stage
#[derive(Debug, Clone, Copy)]
pub struct ClipVertex {
    pub clip: Vector4<f32>,
    pub world: Vector3<f32>,
    pub uv: Vector2<f32>,
    pub normal: Vector3<f32>,
    pub tangent: Vector4<f32>,
}

/// Interpolated fragment inputs
#[derive(Debug, Clone, Copy)]
pub struct Fragment {
    pub world: Vector3<f32>,
    pub uv: Vector2<f32>,
    pub normal: Vector3<f32>,
    pub tangent: Vector4<f32>,
}

struct ScreenVertex {
    x: f32,
    y: f32,
    z: f32,
    inv_w: f32,
}

fn edge(a: &ScreenVertex, b: &ScreenVertex, px: f32, py: f32) -> f32 {
    (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x)
}

/// Left edges run downward and top edges run leftward in a CCW, y-up triangle.
fn is_top_left(a: &ScreenVertex, b: &ScreenVertex) -> bool {
    a.y > b.y || (a.y == b.y && b.x < a.x)
}

fn covers(weight: f32, a: &ScreenVertex, b: &ScreenVertex) -> bool {
    weight > 0.0 || (weight == 0.0 && is_top_left(a, b))
}

/// Rasterises an indexed triangle list.
///
/// `shade` is called for every fragment that passes the depth test.
pub fn draw_triangles(
    target: &mut Framebuffer,
    state: RenderState,
    vertices: &[ClipVertex],
    indices: &[u32],
    mut shade: impl FnMut(&Fragment) -> [f32; 4],
) {
    let (width, height) = (target.width as f32, target.height as f32);

    for triangle in indices.chunks_exact(3) {
        let Some(corners) = triangle
            .iter()
            .map(|&i| vertices.get(i as usize).copied())
            .collect::<Option<Vec<_>>>()
        else {
            continue;
        };

        // Near-plane clipping is not implemented; drop anything behind the eye
        if corners.iter().any(|v| v.clip.w <= 1e-6) {
            continue;
        }

        let screen: Vec<ScreenVertex> = corners
            .iter()
            .map(|v| {
                let inv_w = 1.0 / v.clip.w;
                ScreenVertex {
                    x: (v.clip.x * inv_w * 0.5 + 0.5) * width,
                    y: (v.clip.y * inv_w * 0.5 + 0.5) * height,
                    z: v.clip.z * inv_w,
                    inv_w,
                }
            })
            .collect();
        let (s0, s1, s2) = (&screen[0], &screen[1], &screen[2]);

        let area = edge(s0, s1, s2.x, s2.y);
        if area <= 0.0 {
            continue;
        }

        let min_x = s0.x.min(s1.x).min(s2.x).floor().max(0.0) as u32;
        let max_x = s0.x.max(s1.x).max(s2.x).ceil().min(width) as u32;
        let min_y = s0.y.min(s1.y).min(s2.y).floor().max(0.0) as u32;
        let max_y = s0.y.max(s1.y).max(s2.y).ceil().min(height) as u32;

        for sy in min_y..max_y {
            for sx in min_x..max_x {
                let px = sx as f32 + 0.5;
                let py = sy as f32 + 0.5;

                let w0 = edge(s1, s2, px, py);
                let w1 = edge(s2, s0, px, py);
                let w2 = edge(s0, s1, px, py);
                if !(covers(w0, s1, s2) && covers(w1, s2, s0) && covers(w2, s0, s1)) {
                    continue;
                }

                let (l0, l1, l2) = (w0 / area, w1 / area, w2 / area);
                let z = l0 * s0.z + l1 * s1.z + l2 * s2.z;
                if !(0.0..=1.0).contains(&z) {
                    continue;
                }

                // Screen-space row sy counts up from the bottom
                let row = target.height - 1 - sy;
                let index = (row * target.width + sx) as usize;
                if !state.depth_compare.passes(z, target.depth[index]) {
                    continue;
                }

                let p0 = l0 * s0.inv_w;
                let p1 = l1 * s1.inv_w;
                let p2 = l2 * s2.inv_w;
                let total = p0 + p1 + p2;
                let (p0, p1, p2) = (p0 / total, p1 / total, p2 / total);
                let (a, b, c) = (&corners[0], &corners[1], &corners[2]);

                let fragment = Fragment {
                    world: a.world * p0 + b.world * p1 + c.world * p2,
                    uv: a.uv * p0 + b.uv * p1 + c.uv * p2,
                    normal: a.normal * p0 + b.normal * p1 + c.normal * p2,
                    tangent: a.tangent * p0 + b.tangent * p1 + c.tangent * p2,
                };

                let source = shade(&fragment);
                let destination = target.color[index];
                let blended = match state.blend {
                    BlendMode::Replace => source,
                    BlendMode::Additive => [
                        source[0] + destination[0],
                        source[1] + destination[1],
                        source[2] + destination[2],
                        source[3] + destination[3],
                    ],
                };
                target.color[index] = blended.map(|channel| channel.clamp(0.0, 1.0));
                if state.depth_write {
                    target.depth[index] = z;
                }
            }
        }
    }
}

pub(super) fn normalize_or_zero(v: Vector3<f32>) -> Vector3<f32> {
    if v.magnitude2() > 0.0 {
        v.normalize()
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::rendering::device::DepthCompare;
    use cgmath::Zero;

    fn vertex(x: f32, y: f32, z: f32) -> ClipVertex {
        ClipVertex {
            clip: Vector4::new(x, y, z, 1.0),
            world: Vector3::zero(),
            uv: Vector2::zero(),
            normal: Vector3::unit_z(),
            tangent: Vector4::zero(),
        }
    }

    fn full_screen_quad(z: f32) -> Vec<ClipVertex> {
        vec![
            vertex(-1.0, -1.0, z),
            vertex(1.0, -1.0, z),
            vertex(1.0, 1.0, z),
            vertex(-1.0, 1.0, z),
        ]
    }

    #[test]
    fn test_shared_edge_is_covered_once() {
        let mut target = Framebuffer::new(8, 8, [0.0; 4]);
        let state = RenderState {
            blend: BlendMode::Additive,
            depth_write: false,
            depth_compare: DepthCompare::Always,
        };
        draw_triangles(&mut target, state, &full_screen_quad(0.5), &[0, 1, 2, 0, 2, 3], |_| {
            [0.25, 0.0, 0.0, 0.0]
        });

        assert!(target.pixels().iter().all(|p| p[0] == 0.25));
    }

    #[test]
    fn test_clockwise_triangles_are_culled() {
        let mut target = Framebuffer::new(4, 4, [0.0; 4]);
        draw_triangles(&mut target, RenderState::default(), &full_screen_quad(0.5), &[0, 2, 1], |_| {
            [1.0; 4]
        });
        assert!(target.pixels().iter().all(|p| p[0] == 0.0));
    }

    #[test]
    fn test_depth_less_keeps_nearest() {
        let mut target = Framebuffer::new(4, 4, [0.0; 4]);
        let indices = [0, 1, 2, 0, 2, 3];
        draw_triangles(&mut target, RenderState::default(), &full_screen_quad(0.3), &indices, |_| [1.0, 0.0, 0.0, 1.0]);
        draw_triangles(&mut target, RenderState::default(), &full_screen_quad(0.6), &indices, |_| [0.0, 1.0, 0.0, 1.0]);

        assert_eq!(target.pixel(1, 1), [1.0, 0.0, 0.0, 1.0]);
        assert!((target.depth(1, 1) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_output_is_clamped() {
        let mut target = Framebuffer::new(2, 2, [0.0; 4]);
        draw_triangles(&mut target, RenderState::default(), &full_screen_quad(0.5), &[0, 1, 2, 0, 2, 3], |_| {
            [2.0, -1.0, 0.5, 1.0]
        });
        assert_eq!(target.pixel(0, 0), [1.0, 0.0, 0.5, 1.0]);
    }
}
