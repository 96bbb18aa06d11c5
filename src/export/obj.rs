use std::io::Write;

use crate::export::{ExportItem, ExportResult};

/// Wavefront OBJ with positions, texture coordinates and normals. Every item
/// becomes an `o` block; materials are referenced by name only.
pub fn write_obj<W: Write>(items: &[ExportItem], mut writer: W) -> ExportResult<()> {
    writeln!(writer, "# pivot-export")?;

    // OBJ indices are 1-based and global to the file.
    let mut offset = 1usize;

    for item in items {
        let mesh = item.baked_mesh();
        writeln!(writer, "o {}", item.name)?;

        for primitive in &mesh.primitives {
            for vertex in &primitive.vertices {
                let p = vertex.position;
                writeln!(writer, "v {} {} {}", p.x, p.y, p.z)?;
            }
            for vertex in &primitive.vertices {
                let uv = vertex.tex_coords;
                writeln!(writer, "vt {} {}", uv.x, 1.0 - uv.y)?;
            }
            for vertex in &primitive.vertices {
                let n = vertex.normal;
                writeln!(writer, "vn {} {} {}", n.x, n.y, n.z)?;
            }

            if let Some(material) = &primitive.material {
                writeln!(writer, "usemtl {}", material)?;
            }
            for triangle in primitive.indices.chunks_exact(3) {
                write!(writer, "f")?;
                for &index in triangle {
                    let i = offset + index as usize;
                    write!(writer, " {i}/{i}/{i}")?;
                }
                writeln!(writer)?;
            }

            offset += primitive.vertices.len();
        }
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene_graph::Mesh;
    use glam::{DMat4, DVec3, Vec3};
    use id_arena::Arena;

    #[test]
    fn writes_one_object_per_item() {
        let mut ids = Arena::<crate::scene_graph::Node>::new();
        let mut painted = Mesh::cuboid("Painted", Vec3::ONE);
        painted.primitives[0].material = Some("M_Paint".to_string());
        let plain = Mesh::cuboid("Plain", Vec3::ONE);

        let items = [
            ExportItem {
                id: ids.alloc(Default::default()),
                name: "First",
                mesh: &painted,
                matrix: DMat4::IDENTITY,
            },
            ExportItem {
                id: ids.alloc(Default::default()),
                name: "Second",
                mesh: &plain,
                matrix: DMat4::from_translation(DVec3::new(10.0, 0.0, 0.0)),
            },
        ];

        let mut out = Vec::new();
        write_obj(&items, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let count = |prefix: &str| text.lines().filter(|l| l.starts_with(prefix)).count();
        assert_eq!(count("o "), 2);
        assert_eq!(count("v "), 48);
        assert_eq!(count("vn "), 48);
        assert_eq!(count("f "), 24);
        assert_eq!(count("usemtl "), 1);

        // The second object's faces index past the first object's vertices.
        let last_face = text.lines().filter(|l| l.starts_with("f ")).last().unwrap();
        let first_index: usize = last_face[2..].split('/').next().unwrap().parse().unwrap();
        assert!(first_index > 24);

        let max_x = text
            .lines()
            .filter_map(|l| l.strip_prefix("v "))
            .map(|l| l.split(' ').next().unwrap().parse::<f32>().unwrap())
            .fold(f32::MIN, f32::max);
        assert_eq!(max_x, 11.0);
    }
}
