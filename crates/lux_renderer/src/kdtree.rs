//! Spatial index over the triangles of every mesh in a scene.
//!
//! Each node splits its triangles at the mean vertex coordinate along one
//! axis, cycling x, y, z with depth. A triangle goes to the side containing
//! its centroid, so every triangle is referenced by exactly one leaf; child
//! boxes are tightened to the triangles they own, which keeps straddling
//! triangles inside their leaf's box.
//!
//! Nodes live in a flat arena and refer to their children by index. The tree
//! keeps its own copy of the triangles, tagged with the mesh and triangle
//! index they came from, and must be rebuilt if any mesh changes.

use crate::hittable::{HitRecord, Hittable};
use crate::mesh::TriangleMesh;
use crate::triangle::Triangle;
use lux_math::{Aabb, Ray};

/// Nodes with this many triangles or fewer are not split further.
const MAX_TRIANGLES_PER_LEAF: usize = 3;

/// A triangle stored in the tree.
#[derive(Debug, Clone)]
struct KdTriangle {
    triangle: Triangle,
    mesh_index: usize,
    triangle_index: usize,
    cull_backfaces: bool,
    bbox: Aabb,
}

#[derive(Debug, Clone)]
enum KdNodeContent {
    /// Indices into the tree's triangle list
    Leaf(Vec<usize>),
    /// Arena indices of the two children
    Split([usize; 2]),
}

#[derive(Debug, Clone)]
struct KdNode {
    bbox: Aabb,
    axis: usize,
    content: KdNodeContent,
}

/// Nearest-hit result from the tree.
#[derive(Debug, Clone, Copy)]
pub struct KdHit {
    pub record: HitRecord,
    /// Index of the mesh the triangle belongs to
    pub mesh_index: usize,
    /// Index of the triangle within that mesh
    pub triangle_index: usize,
}

/// Shape statistics, logged after a build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KdTreeStats {
    pub triangles: usize,
    pub nodes: usize,
    pub leaves: usize,
    pub max_depth: usize,
    pub max_leaf_size: usize,
}

/// Binary space partitioning tree over mesh triangles.
#[derive(Debug, Clone)]
pub struct KdTree {
    triangles: Vec<KdTriangle>,
    nodes: Vec<KdNode>,
    stats: KdTreeStats,
}

impl KdTree {
    /// Build the tree over every triangle of `meshes`.
    pub fn build(meshes: &[TriangleMesh]) -> Self {
        let triangles: Vec<KdTriangle> = meshes
            .iter()
            .enumerate()
            .flat_map(|(mesh_index, mesh)| {
                mesh.triangles()
                    .iter()
                    .enumerate()
                    .map(move |(triangle_index, tri)| KdTriangle {
                        triangle: *tri,
                        mesh_index,
                        triangle_index,
                        cull_backfaces: mesh.cull_backfaces,
                        bbox: tri.bounding_box(),
                    })
            })
            .collect();

        let root_members: Vec<usize> = (0..triangles.len()).collect();
        let mut nodes = vec![Self::make_node(&triangles, root_members, 0)];
        let mut stats = KdTreeStats {
            triangles: triangles.len(),
            ..Default::default()
        };

        // (node index, depth)
        let mut to_process = vec![(0usize, 0usize)];
        while let Some((current, depth)) = to_process.pop() {
            stats.max_depth = stats.max_depth.max(depth);

            let axis = nodes[current].axis;
            let members = match &nodes[current].content {
                KdNodeContent::Leaf(members) if members.len() > MAX_TRIANGLES_PER_LEAF => {
                    members.clone()
                }
                _ => continue,
            };

            let mean = members
                .iter()
                .flat_map(|&i| triangles[i].triangle.vertices())
                .map(|v| v[axis])
                .sum::<f32>()
                / (members.len() * 3) as f32;

            let (first, second): (Vec<usize>, Vec<usize>) = members
                .iter()
                .partition(|&&i| triangles[i].triangle.centroid()[axis] <= mean);

            let degenerate = first.is_empty() || second.is_empty();
            let child_axis = (axis + 1) % 3;
            let first_index = nodes.len();
            nodes.push(Self::make_node(&triangles, first, child_axis));
            nodes.push(Self::make_node(&triangles, second, child_axis));
            nodes[current].content = KdNodeContent::Split([first_index, first_index + 1]);

            // A split that separates nothing would repeat forever on
            // coincident geometry; both children stay leaves.
            if degenerate {
                stats.max_depth = stats.max_depth.max(depth + 1);
            } else {
                to_process.push((first_index, depth + 1));
                to_process.push((first_index + 1, depth + 1));
            }
        }

        stats.nodes = nodes.len();
        for node in &nodes {
            if let KdNodeContent::Leaf(members) = &node.content {
                stats.leaves += 1;
                stats.max_leaf_size = stats.max_leaf_size.max(members.len());
            }
        }

        log::info!(
            "KdTree built: {} triangles, {} nodes, {} leaves, depth {}, largest leaf {}",
            stats.triangles,
            stats.nodes,
            stats.leaves,
            stats.max_depth,
            stats.max_leaf_size
        );

        Self {
            triangles,
            nodes,
            stats,
        }
    }

    /// A leaf owning `members`, with its box grown from exactly those triangles.
    fn make_node(triangles: &[KdTriangle], members: Vec<usize>, axis: usize) -> KdNode {
        let bbox = members
            .iter()
            .fold(Aabb::EMPTY, |acc, &i| acc.union(&triangles[i].bbox));
        KdNode {
            bbox,
            axis,
            content: KdNodeContent::Leaf(members),
        }
    }

    pub fn stats(&self) -> KdTreeStats {
        self.stats
    }

    /// Bounding box of all indexed triangles.
    pub fn bounds(&self) -> Aabb {
        self.nodes[0].bbox
    }

    /// Check structural invariants: every triangle appears in exactly one
    /// leaf, inside that leaf's box, and every child is referenced once.
    pub fn is_consistent(&self) -> bool {
        let mut triangle_refs = vec![0usize; self.triangles.len()];
        let mut parent_refs = vec![0usize; self.nodes.len()];

        for node in &self.nodes {
            match &node.content {
                KdNodeContent::Leaf(members) => {
                    for &i in members {
                        triangle_refs[i] += 1;
                        if !node.bbox.contains_box(&self.triangles[i].bbox) {
                            return false;
                        }
                    }
                }
                KdNodeContent::Split(children) => {
                    for &c in children {
                        parent_refs[c] += 1;
                    }
                }
            }
        }

        triangle_refs.iter().all(|&n| n == 1)
            && parent_refs[0] == 0
            && parent_refs[1..].iter().all(|&n| n == 1)
    }

    /// Nearest hit along `ray` closer than `t_max`.
    ///
    /// Each triangle applies the backface culling flag of its mesh.
    pub fn intersect(&self, ray: &Ray, t_max: f32) -> Option<KdHit> {
        let mut closest = t_max;
        let mut result = None;

        let mut stack = vec![0usize];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if node.bbox.hit(ray, closest).is_none() {
                continue;
            }

            match &node.content {
                KdNodeContent::Leaf(members) => {
                    for &i in members {
                        let kd = &self.triangles[i];
                        if let Some(record) = kd.triangle.intersect(ray, closest, kd.cull_backfaces)
                        {
                            closest = record.t;
                            result = Some(KdHit {
                                record,
                                mesh_index: kd.mesh_index,
                                triangle_index: kd.triangle_index,
                            });
                        }
                    }
                }
                KdNodeContent::Split([first, second]) => {
                    // Visit the child on the ray's side of the split first
                    let (near, far) = if ray.direction()[node.axis] >= 0.0 {
                        (*first, *second)
                    } else {
                        (*second, *first)
                    };
                    stack.push(far);
                    stack.push(near);
                }
            }
        }

        result
    }

    /// True if any triangle whose mesh passes `occludes` is hit closer
    /// than `t_max`. Faces are tested from both sides.
    ///
    /// Returns on the first hit found rather than the nearest one.
    pub fn any_hit<F>(&self, ray: &Ray, t_max: f32, occludes: F) -> bool
    where
        F: Fn(usize) -> bool,
    {
        let mut stack = vec![0usize];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if node.bbox.hit(ray, t_max).is_none() {
                continue;
            }

            match &node.content {
                KdNodeContent::Leaf(members) => {
                    let blocked = members.iter().any(|&i| {
                        let kd = &self.triangles[i];
                        occludes(kd.mesh_index)
                            && kd.triangle.intersect(ray, t_max, false).is_some()
                    });
                    if blocked {
                        return true;
                    }
                }
                KdNodeContent::Split(children) => stack.extend_from_slice(children),
            }
        }
        false
    }
}
