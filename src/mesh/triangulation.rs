use std::{fmt, fs, path::Path, str::FromStr, sync::OnceLock};

use anyhow::{bail, Context};
use itertools::Itertools;

/// An ordered list of landmark indices, grouped into runs of three that each form one triangle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriangulationTable {
    indices: Box<[u32]>,
}

impl TriangulationTable {
    pub fn new(indices: impl Into<Box<[u32]>>) -> Self {
        Self {
            indices: indices.into(),
        }
    }

    /// Reads and parses a table from a text file.
    ///
    /// See [`TriangulationTable::from_str`] for the format.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read triangulation table '{}'", path.display()))?;
        text.parse()
            .with_context(|| format!("invalid triangulation table '{}'", path.display()))
    }

    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Returns the number of indices in the table.
    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Returns the number of complete triangles described by the table.
    #[inline]
    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    /// Returns the trailing indices that do not form a complete triangle.
    pub fn remainder(&self) -> &[u32] {
        self.indices.chunks_exact(3).remainder()
    }

    /// Returns an iterator over the index triples of all complete triangles.
    pub fn runs(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices
            .iter()
            .copied()
            .tuples()
            .map(|(a, b, c)| [a, b, c])
    }

    /// Returns the largest index in the table.
    pub fn max_index(&self) -> Option<u32> {
        self.indices.iter().copied().max()
    }

    /// Checks that every index can be resolved against `num_keypoints` keypoints.
    pub fn validate(&self, num_keypoints: usize) -> anyhow::Result<()> {
        if let Some((pos, index)) = self
            .indices
            .iter()
            .find_position(|&&i| i as usize >= num_keypoints)
        {
            bail!(
                "triangulation table entry #{} is {}, but the landmark model only produces {} keypoints",
                pos,
                index,
                num_keypoints,
            );
        }
        if !self.remainder().is_empty() {
            log::warn!(
                "triangulation table has {} trailing indices that do not form a triangle",
                self.remainder().len(),
            );
        }
        Ok(())
    }
}

/// Error returned when parsing a [`TriangulationTable`] from text fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTableError {
    line: usize,
    token: String,
}

impl ParseTableError {
    /// The 1-based line number the invalid token was found on.
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Display for ParseTableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid index '{}' on line {} (expected a non-negative integer)",
            self.token, self.line
        )
    }
}

impl std::error::Error for ParseTableError {}

/// Parses a table from integers separated by commas and/or whitespace.
///
/// `#` starts a comment that runs until the end of the line.
impl FromStr for TriangulationTable {
    type Err = ParseTableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut indices = Vec::new();
        for (i, line) in s.lines().enumerate() {
            let content = line.split('#').next().unwrap_or("");
            for token in content
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|t| !t.is_empty())
            {
                let index = token.parse().map_err(|_| ParseTableError {
                    line: i + 1,
                    token: token.to_string(),
                })?;
                indices.push(index);
            }
        }
        Ok(Self::new(indices))
    }
}

/// Returns the triangulation of the 468-point face mesh.
pub fn face_mesh() -> &'static TriangulationTable {
    static TABLE: OnceLock<TriangulationTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        match include_str!("../../assets/face_mesh_triangulation.txt").parse() {
            Ok(table) => table,
            Err(e) => unreachable!("embedded face mesh triangulation is malformed: {e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn parse_separators_and_comments() {
        let table: TriangulationTable = "# header\n0, 1,2\n  1 2\t3 # trailing\n\n4,"
            .parse()
            .unwrap();
        assert_eq!(table.indices(), &[0, 1, 2, 1, 2, 3, 4]);
        assert_eq!(table.num_triangles(), 2);
        assert_eq!(table.remainder(), &[4]);
        assert_eq!(table.runs().collect::<Vec<_>>(), [[0, 1, 2], [1, 2, 3]]);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = "0, 1, 2\n3, -4, 5".parse::<TriangulationTable>().unwrap_err();
        assert_eq!(err.line(), 2);
        assert_eq!(err.token(), "-4");
        assert_eq!(
            err.to_string(),
            "invalid index '-4' on line 2 (expected a non-negative integer)"
        );
    }

    #[test]
    fn validate_rejects_out_of_range() {
        let table = TriangulationTable::new(vec![0, 1, 2, 2, 3, 4]);
        assert!(table.validate(5).is_ok());
        let msg = table.validate(4).unwrap_err().to_string();
        assert!(msg.contains("entry #5 is 4"), "{msg}");
    }

    #[test]
    fn face_mesh_table_is_well_formed() {
        let table = face_mesh();
        assert_eq!(table.len(), 2640);
        assert_eq!(table.num_triangles(), 880);
        assert!(table.remainder().is_empty());
        assert_eq!(table.max_index(), Some(467));
        table.validate(468).unwrap();

        let mut used = vec![false; 468];
        for &i in table.indices() {
            used[i as usize] = true;
        }
        assert!(used.iter().all(|&u| u), "every landmark is part of the mesh");
    }

    #[test]
    fn face_mesh_table_is_a_manifold() {
        let mut edges = HashMap::new();
        for [a, b, c] in face_mesh().runs() {
            assert!(a != b && b != c && a != c, "degenerate triangle {a} {b} {c}");
            for (p, q) in [(a, b), (b, c), (c, a)] {
                *edges.entry((p.min(q), p.max(q))).or_insert(0) += 1;
            }
        }
        assert!(edges.values().all(|&n| n <= 2));

        // Open edges run around the face oval and the inner lips.
        let open = edges.values().filter(|&&n| n == 1).count();
        assert_eq!(open, 36 + 20);
    }
}
