use ahash::HashMap;
use rstar::{primitives::GeomWithData, Point, RTree};

/// Neighbor lists longer than this are reported once per cache.
pub const NEIGHBOR_COUNT_WARNING_THRESHOLD: usize = 20000;

/// Bucket maps this many times larger than the particle count get compacted on rebuild.
const STALE_CELL_FACTOR: usize = 4;

use crate::{
    concurrency::par_iter_mut1, floating_type_mod::FT, simulation_parameters::NeighborhoodSearchAlgorithm, V3, VI3,
};

#[derive(Debug, PartialEq, Clone, Copy)]
struct CustomRTreePoint {
    p: V3,
}

impl Point for CustomRTreePoint {
    type Scalar = FT;

    const DIMENSIONS: usize = 3;

    fn generate(mut generator: impl FnMut(usize) -> Self::Scalar) -> Self {
        CustomRTreePoint {
            p: V3::from_iterator((0..3).map(|d| generator(d))),
        }
    }

    fn nth(&self, index: usize) -> Self::Scalar {
        self.p[index]
    }

    fn nth_mut(&mut self, index: usize) -> &mut Self::Scalar {
        &mut self.p[index]
    }
}

impl From<V3> for CustomRTreePoint {
    fn from(p: V3) -> Self {
        CustomRTreePoint { p }
    }
}

type CustomRTreeElem = GeomWithData<CustomRTreePoint, u32>;

pub fn iterate_cell_offsets(dist: i32, mut f: impl FnMut(VI3)) {
    for z in -dist..=dist {
        for y in -dist..=dist {
            for x in -dist..=dist {
                f([x, y, z].into());
            }
        }
    }
}

fn position_to_cell(position: V3, cell_size: FT) -> VI3 {
    // float to int casts saturate
    (position / cell_size).map(|x| x.floor() as i32)
}

/**
 * Answers "which particles lie strictly within `radius` of a point" for one snapshot of positions.
 *
 * The index stores particle indices only, so the same position slice has to be passed to
 * `rebuild` and to every following `query`.
 */
pub struct SpatialIndex {
    algorithm: NeighborhoodSearchAlgorithm,
    cell_size: FT,
    cells: HashMap<[i32; 3], Vec<u32>>,
    rtree: RTree<CustomRTreeElem>,
}

impl SpatialIndex {
    /// `cell_size` should be at least the query radius to keep queries at 27 cells.
    /// A cell size that is not a positive finite number falls back to 1.
    pub fn new(algorithm: NeighborhoodSearchAlgorithm, cell_size: FT) -> SpatialIndex {
        let cell_size = if cell_size.is_finite() && cell_size > 0. { cell_size } else { 1. };
        SpatialIndex {
            algorithm,
            cell_size,
            cells: HashMap::default(),
            rtree: RTree::new(),
        }
    }

    pub fn algorithm(&self) -> NeighborhoodSearchAlgorithm {
        self.algorithm
    }

    pub fn rebuild(&mut self, positions: &[V3]) {
        match self.algorithm {
            NeighborhoodSearchAlgorithm::HashGrid => {
                // buckets are kept alive between rebuilds, only their contents are replaced
                for bucket in self.cells.values_mut() {
                    bucket.clear();
                }
                if self.cells.len() > STALE_CELL_FACTOR * positions.len() + 64 {
                    self.cells.retain(|_, bucket| !bucket.is_empty());
                }

                for (particle_id, position) in positions.iter().enumerate() {
                    if !is_finite(position) {
                        continue;
                    }
                    let cell_pos = position_to_cell(*position, self.cell_size);
                    self.cells
                        .entry([cell_pos.x, cell_pos.y, cell_pos.z])
                        .or_insert_with(Vec::new)
                        .push(particle_id as u32);
                }
            }
            NeighborhoodSearchAlgorithm::RStar => {
                let rtree_elems: Vec<_> = positions
                    .iter()
                    .enumerate()
                    .filter(|(_, position)| is_finite(position))
                    .map(|(idx, position)| CustomRTreeElem::new(CustomRTreePoint::from(*position), idx as u32))
                    .collect();

                self.rtree = RTree::bulk_load(rtree_elems);
            }
        }
    }

    /// Append every particle `j` with `|positions[j] - point| < radius` to `out`.
    pub fn query(&self, positions: &[V3], point: V3, radius: FT, out: &mut Vec<u32>) {
        if !is_finite(&point) || !(radius > 0.) {
            return;
        }
        let radius_sq = radius * radius;

        match self.algorithm {
            NeighborhoodSearchAlgorithm::HashGrid => {
                let reach = FT::max(1., (radius / self.cell_size).ceil()) as i32;
                let center_cell = position_to_cell(point, self.cell_size);

                iterate_cell_offsets(reach, |offset| {
                    let cell_pos = center_cell.zip_map(&offset, |c, o| c.saturating_add(o));
                    let bucket = match self.cells.get(&[cell_pos.x, cell_pos.y, cell_pos.z]) {
                        Some(bucket) => bucket,
                        None => return,
                    };

                    for &j in bucket {
                        if (positions[j as usize] - point).norm_squared() < radius_sq {
                            out.push(j);
                        }
                    }
                });
            }
            NeighborhoodSearchAlgorithm::RStar => {
                for neigh_point in self
                    .rtree
                    .locate_within_distance(CustomRTreePoint::from(point), radius_sq)
                {
                    // `locate_within_distance` includes the boundary
                    if (neigh_point.geom().p - point).norm_squared() < radius_sq {
                        out.push(neigh_point.data);
                    }
                }
            }
        }
    }

    pub fn neighbors(&self, positions: &[V3], point: V3, radius: FT) -> Vec<usize> {
        let mut out = Vec::new();
        self.query(positions, point, radius, &mut out);
        out.into_iter().map(|j| j as usize).collect()
    }
}

fn is_finite(v: &V3) -> bool {
    v.iter().all(|x| x.is_finite())
}

/**
 * For each particle the indices of all particles within the kernel radius, including the
 * particle itself. Rebuilt after every `SpatialIndex::rebuild`.
 */
pub struct NeighborhoodCache {
    neighs: Vec<Vec<u32>>,
    warning_threshold: usize,
    threshold_exceeded: bool,
}

impl NeighborhoodCache {
    pub fn new(num_particles: usize) -> Self {
        Self::with_warning_threshold(num_particles, NEIGHBOR_COUNT_WARNING_THRESHOLD)
    }

    pub fn with_warning_threshold(num_particles: usize, warning_threshold: usize) -> Self {
        NeighborhoodCache {
            neighs: (0..num_particles).map(|_| Vec::new()).collect(),
            warning_threshold,
            threshold_exceeded: false,
        }
    }

    /// True once any build produced a neighbor list longer than the warning threshold.
    pub fn threshold_exceeded(&self) -> bool {
        self.threshold_exceeded
    }

    pub fn iter<'a>(&'a self, i: usize) -> impl Iterator<Item = usize> + 'a {
        self.neighs[i].iter().map(|&x| x as usize)
    }

    /// All neighbors except `i` itself.
    pub fn iter_others<'a>(&'a self, i: usize) -> impl Iterator<Item = usize> + 'a {
        self.iter(i).filter(move |&j| j != i)
    }

    pub fn neighbor_count(&self, i: usize) -> usize {
        self.neighs[i].len()
    }

    pub fn len(&self) -> usize {
        self.neighs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighs.is_empty()
    }

    pub fn clear(&mut self) {
        for neigh_list in &mut self.neighs {
            neigh_list.clear();
        }
    }

    /// Rebuild `index` from `positions` and gather the neighbor list of every particle.
    ///
    /// Without a positive radius every finite particle is only its own neighbor.
    pub fn build(&mut self, index: &mut SpatialIndex, positions: &[V3], radius: FT) {
        assert_eq!(self.neighs.len(), positions.len());

        if !(radius > 0.) {
            par_iter_mut1(&mut self.neighs, |i, p_neighs| {
                p_neighs.clear();
                if is_finite(&positions[i]) {
                    p_neighs.push(i as u32);
                }
            });
            return;
        }

        index.rebuild(positions);
        let index = &*index;

        par_iter_mut1(&mut self.neighs, |i, p_neighs| {
            p_neighs.clear();
            index.query(positions, positions[i], radius, p_neighs);
        });

        if !self.threshold_exceeded {
            let max_count = self.neighs.iter().map(|n| n.len()).max().unwrap_or(0);
            if max_count > self.warning_threshold {
                self.threshold_exceeded = true;
                log::warn!(
                    "a particle has {} neighbors (more than {}), the fluid is heavily compressed",
                    max_count,
                    self.warning_threshold
                );
            }
        }
    }

    pub fn average_neighbor_count(&self) -> FT {
        if self.neighs.is_empty() {
            return 0.;
        }
        self.neighs.iter().map(|n| n.len()).sum::<usize>() as FT / self.neighs.len() as FT
    }

    /// Brute force check of every neighbor list. Quadratic in the particle count.
    pub fn check_neighborhood(&self, positions: &[V3], radius: FT) {
        log::warn!("=====> SLOW: CHECK NEIGHBORHOOD OF ALL PARTICLES <=====");

        let num_particles = positions.len();
        for i in 0..num_particles {
            if !is_finite(&positions[i]) {
                continue;
            }

            assert!(
                self.iter(i).any(|j| j == i),
                "neighbor search bug: particle {} is not neighbor of itself",
                i
            );

            // check: J is neighbor of I => I is neighbor of J
            assert!(
                self.iter(i).all(|j| self.iter(j).any(|i2| i == i2)),
                "neighbor search bug: neighborhood of particle {} is not symmetric",
                i
            );

            let mut neighs_i: Vec<usize> = self.iter(i).collect();
            let neighs_i_len = neighs_i.len();
            neighs_i.sort_unstable();
            neighs_i.dedup();
            assert!(
                neighs_i_len == neighs_i.len(),
                "neighbor search bug: duplicate entries for particle {}",
                i
            );

            // check: we find a neighbor IFF x_ij < radius
            for j in 0..num_particles {
                let interact = (positions[i] - positions[j]).norm_squared() < radius * radius;
                assert_eq!(
                    neighs_i.binary_search(&j).is_ok(),
                    interact,
                    "neighbor search bug: particles {} and {}",
                    i,
                    j
                );
            }
        }
    }
}
