//! Reader for the OFF (Object File Format) polygon mesh format.
//!
//! ```text
//! OFF
//! <vertex count> <face count> <edge count>
//! x y z            (one line per vertex)
//! n i0 i1 .. in-1  (one line per face)
//! ```
//!
//! `#` starts a comment. Faces with more than three corners are
//! fan-triangulated around their first corner.

use std::path::Path;

use lux_math::Vec3;

use crate::mesh::{Mesh, MeshError, MeshResult};

/// Load an OFF file from disk.
pub fn load_off(path: impl AsRef<Path>) -> MeshResult<Mesh> {
    let path = path.as_ref();
    log::debug!("Loading OFF mesh: {}", path.display());

    let source = std::fs::read_to_string(path)?;
    let mesh = parse_off(&source)?;

    log::debug!(
        "Loaded {}: {} vertices, {} triangles",
        path.display(),
        mesh.vertex_count(),
        mesh.triangle_count()
    );
    Ok(mesh)
}

/// Parse OFF text into a triangle mesh.
///
/// Face corners referencing a missing vertex are skipped with a warning.
/// The result is validated, so an OFF file with no usable faces is an error.
pub fn parse_off(source: &str) -> MeshResult<Mesh> {
    let mut lines = source
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, strip_comment(line).trim()))
        .filter(|(_, line)| !line.is_empty());

    let (header_line, header) = lines.next().ok_or(MeshError::Empty)?;
    // Some exporters put the counts on the header line itself
    let counts_inline = match header.strip_prefix("OFF") {
        Some(rest) => rest.trim(),
        None => return Err(parse_error(header_line, "missing OFF header")),
    };

    let (counts_line, counts) = if counts_inline.is_empty() {
        lines
            .next()
            .ok_or_else(|| parse_error(header_line, "missing element counts"))?
    } else {
        (header_line, counts_inline)
    };

    let counts = parse_numbers::<usize>(counts_line, counts)?;
    let (vertex_count, face_count) = match counts.as_slice() {
        [v, f, ..] => (*v, *f),
        _ => return Err(parse_error(counts_line, "expected vertex and face counts")),
    };

    let mut positions = Vec::new();
    for _ in 0..vertex_count {
        let (line_no, line) = lines
            .next()
            .ok_or_else(|| parse_error(counts_line, "unexpected end of vertex list"))?;
        let coords = parse_numbers::<f32>(line_no, line)?;
        match coords.as_slice() {
            [x, y, z, ..] => positions.push(Vec3::new(*x, *y, *z)),
            _ => return Err(parse_error(line_no, "vertex needs three coordinates")),
        }
    }

    let mut triangles = Vec::new();
    for _ in 0..face_count {
        let (line_no, line) = lines
            .next()
            .ok_or_else(|| parse_error(counts_line, "unexpected end of face list"))?;
        let values = parse_numbers::<u32>(line_no, line)?;
        let Some((&corner_count, rest)) = values.split_first() else {
            return Err(parse_error(line_no, "empty face"));
        };

        let corner_count = corner_count as usize;
        if rest.len() < corner_count {
            return Err(parse_error(line_no, "face has fewer indices than declared"));
        }
        // Trailing values are per-face colours, ignored
        let corners = &rest[..corner_count];

        if let Some(&bad) = corners.iter().find(|&&i| i as usize >= vertex_count) {
            log::warn!(
                "OFF line {}: vertex index {} out of range ({} vertices), face skipped",
                line_no,
                bad,
                vertex_count
            );
            continue;
        }

        for k in 1..corner_count.saturating_sub(1) {
            triangles.push([corners[0], corners[k], corners[k + 1]]);
        }
    }

    let mesh = Mesh::from_positions(positions, triangles);
    mesh.validate()?;
    Ok(mesh)
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn parse_numbers<T: std::str::FromStr>(line_no: usize, line: &str) -> MeshResult<Vec<T>> {
    line.split_whitespace()
        .map(|token| {
            token
                .parse::<T>()
                .map_err(|_| parse_error(line_no, &format!("invalid number '{}'", token)))
        })
        .collect()
}

fn parse_error(line: usize, message: &str) -> MeshError {
    MeshError::Parse {
        line,
        message: message.to_string(),
    }
}
