//! Face mesh construction.
//!
//! A [`TriangulationTable`] describes which landmarks are connected into triangles. The
//! [`triangles`] function maps one detection's keypoints through a table, yielding the triangles
//! to render.

mod triangulation;

use std::{fmt, iter::FusedIterator, slice::ChunksExact};

use crate::landmark::{Keypoint, Point};

pub use triangulation::{face_mesh, ParseTableError, TriangulationTable};

/// Three points forming one triangle of the mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle(pub [Point; 3]);

impl Triangle {
    #[inline]
    pub fn points(&self) -> &[Point; 3] {
        &self.0
    }
}

/// Errors produced while building a mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    /// The triangulation table refers to a keypoint that does not exist.
    IndexOutOfRange {
        /// The offending table entry.
        index: usize,
        /// Number of keypoints available.
        len: usize,
    },
}

impl fmt::Display for MeshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeshError::IndexOutOfRange { index, len } => write!(
                f,
                "triangulation index {index} is out of range for {len} keypoints"
            ),
        }
    }
}

impl std::error::Error for MeshError {}

/// Iterator over the triangles of one detection, returned by [`triangles`].
///
/// The iterator is lazy: keypoints are only looked up when a triangle is requested. Cloning it
/// yields an independent iterator starting at the same position.
#[derive(Clone)]
pub struct Triangles<'a> {
    keypoints: &'a [Keypoint],
    runs: ChunksExact<'a, u32>,
}

impl<'a> Triangles<'a> {
    fn lookup(&self, index: u32) -> Result<Point, MeshError> {
        let index = index as usize;
        self.keypoints
            .get(index)
            .map(Keypoint::point)
            .ok_or(MeshError::IndexOutOfRange {
                index,
                len: self.keypoints.len(),
            })
    }
}

impl Iterator for Triangles<'_> {
    type Item = Result<Triangle, MeshError>;

    fn next(&mut self) -> Option<Self::Item> {
        let run = self.runs.next()?;
        Some((|| {
            Ok(Triangle([
                self.lookup(run[0])?,
                self.lookup(run[1])?,
                self.lookup(run[2])?,
            ]))
        })())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.runs.size_hint()
    }
}

impl ExactSizeIterator for Triangles<'_> {}

impl FusedIterator for Triangles<'_> {}

/// Maps `keypoints` through `table`, yielding one triangle per run of three table entries.
///
/// Triangle `i` consists of the keypoints at `table[3i]`, `table[3i + 1]` and `table[3i + 2]`,
/// in that order. If the table length is not a multiple of three, the trailing entries are
/// ignored. A table entry that is out of range for `keypoints` produces a
/// [`MeshError::IndexOutOfRange`] for the affected triangle.
pub fn triangles<'a>(keypoints: &'a [Keypoint], table: &'a TriangulationTable) -> Triangles<'a> {
    Triangles {
        keypoints,
        runs: table.indices().chunks_exact(3),
    }
}

/// Builds all triangles of a detection, stopping at the first out-of-range index.
pub fn build_mesh(
    keypoints: &[Keypoint],
    table: &TriangulationTable,
) -> Result<Vec<Triangle>, MeshError> {
    triangles(keypoints, table).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Keypoint> {
        vec![
            Keypoint::new(0.0, 0.0),
            Keypoint::new(1.0, 0.0),
            Keypoint::new(1.0, 1.0),
            Keypoint::new(0.0, 1.0),
        ]
    }

    fn tri(points: [(f32, f32); 3]) -> Triangle {
        Triangle(points.map(Point::from))
    }

    #[test]
    fn builds_triangles_in_table_order() {
        let table = TriangulationTable::new(vec![0, 1, 2, 1, 2, 3]);
        let keypoints = square();
        let mesh = build_mesh(&keypoints, &table).unwrap();
        assert_eq!(
            mesh,
            [
                tri([(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]),
                tri([(1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]),
            ]
        );
    }

    #[test]
    fn drops_trailing_remainder() {
        let keypoints = square();
        for extra in [vec![3], vec![3, 0]] {
            let mut indices = vec![0, 1, 2];
            indices.extend(extra);
            let table = TriangulationTable::new(indices);
            let iter = triangles(&keypoints, &table);
            assert_eq!(iter.len(), 1);
            assert_eq!(iter.filter(Result::is_ok).count(), 1);
        }
    }

    #[test]
    fn out_of_range_index_is_reported_per_triangle() {
        let table = TriangulationTable::new(vec![0, 1, 2, 1, 4, 3, 0, 2, 3]);
        let keypoints = square();
        let results = triangles(&keypoints, &table).collect::<Vec<_>>();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert_eq!(
            results[1],
            Err(MeshError::IndexOutOfRange { index: 4, len: 4 })
        );
        assert!(results[2].is_ok());

        assert_eq!(
            build_mesh(&keypoints, &table),
            Err(MeshError::IndexOutOfRange { index: 4, len: 4 })
        );
    }

    #[test]
    fn iterator_is_restartable() {
        let table = TriangulationTable::new(vec![0, 1, 2, 1, 2, 3]);
        let keypoints = square();
        let mut iter = triangles(&keypoints, &table);
        let snapshot = iter.clone();
        iter.next();
        assert_eq!(iter.count(), 1);
        assert_eq!(snapshot.count(), 2);
        assert_eq!(triangles(&keypoints, &table).count(), 2);
    }

    #[test]
    fn empty_table_yields_nothing() {
        let table = TriangulationTable::new(Vec::new());
        assert_eq!(triangles(&square(), &table).count(), 0);
        assert_eq!(triangles(&[], &table).count(), 0);
    }

    #[test]
    fn error_message() {
        let err = MeshError::IndexOutOfRange { index: 470, len: 468 };
        assert_eq!(
            err.to_string(),
            "triangulation index 470 is out of range for 468 keypoints"
        );
    }
}
