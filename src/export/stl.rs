use std::io::Write;

use glam::Vec3;

use crate::export::{ExportError, ExportItem, ExportResult};

const HEADER_SIZE: usize = 80;

/// Binary STL. All items are flattened into one triangle soup.
pub fn write_stl<W: Write>(items: &[ExportItem], mut writer: W) -> ExportResult<()> {
    let meshes = items.iter().map(ExportItem::baked_mesh).collect::<Vec<_>>();
    // Triangles with out-of-range indices are dropped, so count what is written.
    let triangles = meshes
        .iter()
        .flat_map(|mesh| &mesh.primitives)
        .flat_map(|primitive| primitive.triangles())
        .collect::<Vec<_>>();

    let triangle_count = u32::try_from(triangles.len())
        .map_err(|_| ExportError::TooLarge(format!("{} triangles", triangles.len())))?;

    let mut header = [b' '; HEADER_SIZE];
    let text = b"Binary STL written by pivot-export";
    header[..text.len()].copy_from_slice(text);
    writer.write_all(&header)?;
    writer.write_all(&triangle_count.to_le_bytes())?;

    for triangle in triangles {
        let [a, b, c] = triangle.map(|vertex| vertex.position);
        let normal = (b - a).cross(c - a).normalize_or_zero();

        write_vec3(&mut writer, normal)?;
        for position in [a, b, c] {
            write_vec3(&mut writer, position)?;
        }
        writer.write_all(&0u16.to_le_bytes())?;
    }

    writer.flush()?;
    Ok(())
}

fn write_vec3<W: Write>(writer: &mut W, v: Vec3) -> ExportResult<()> {
    writer.write_all(&v.x.to_le_bytes())?;
    writer.write_all(&v.y.to_le_bytes())?;
    writer.write_all(&v.z.to_le_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene_graph::{Mesh, Node};
    use glam::DMat4;
    use id_arena::Arena;

    #[test]
    fn binary_layout() {
        let mut ids = Arena::<Node>::new();
        let mesh = Mesh::cuboid("Box", Vec3::ONE);
        let items = [ExportItem {
            id: ids.alloc(Node::default()),
            name: "Box",
            mesh: &mesh,
            matrix: DMat4::IDENTITY,
        }];

        let mut out = Vec::new();
        write_stl(&items, &mut out).unwrap();

        assert_eq!(out.len(), HEADER_SIZE + 4 + 12 * 50);
        let count = u32::from_le_bytes(out[HEADER_SIZE..HEADER_SIZE + 4].try_into().unwrap());
        assert_eq!(count, 12);
        assert!(out.starts_with(b"Binary STL"));

        // The first facet normal agrees with the box face it belongs to.
        let facet = &out[HEADER_SIZE + 4..];
        let nx = f32::from_le_bytes(facet[0..4].try_into().unwrap());
        assert_eq!(nx, 1.0);
    }

    #[test]
    fn header_counts_only_written_facets() {
        let mut ids = Arena::<Node>::new();
        let mut mesh = Mesh::cuboid("Box", Vec3::ONE);
        // One triangle points past the vertex buffer.
        mesh.primitives[0].indices.extend([0, 1, 99]);
        let items = [ExportItem {
            id: ids.alloc(Node::default()),
            name: "Box",
            mesh: &mesh,
            matrix: DMat4::IDENTITY,
        }];

        let mut out = Vec::new();
        write_stl(&items, &mut out).unwrap();

        let count = u32::from_le_bytes(out[HEADER_SIZE..HEADER_SIZE + 4].try_into().unwrap());
        assert_eq!(count, 12);
        assert_eq!(out.len(), HEADER_SIZE + 4 + count as usize * 50);
    }
}
