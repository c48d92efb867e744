//! File-backed model loader
//!
//! Scans STL and OBJ files for the vertex bounds of each renderable part.
//! FBX is accepted but not parsed: it yields a unit-cube placeholder so the
//! model can still be placed and measured.

use glam::DVec3;
use holodraft_core::{BoundingVolume, LoadError, LoadRequest, LoadedAsset, ModelLoader, PartNode, SourceFormat};
use std::path::Path;
use tracing::{debug, warn};

const STL_HEADER_LEN: usize = 80;
const STL_TRIANGLE_LEN: usize = 50;
const DEFAULT_MATERIAL: &str = "default";

#[derive(Debug, Clone, Default)]
pub struct MeshFileLoader;

impl MeshFileLoader {
    pub fn new() -> Self {
        Self
    }
}

impl ModelLoader for MeshFileLoader {
    async fn load(&self, request: LoadRequest) -> Result<LoadedAsset, LoadError> {
        tokio::task::spawn_blocking(move || load_file(&request))
            .await
            .map_err(|e| LoadError::ParseFailed(format!("loader task failed: {}", e)))?
    }
}

/// Load a model file synchronously
pub fn load_file(request: &LoadRequest) -> Result<LoadedAsset, LoadError> {
    let name = request
        .path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string());

    let asset = match &request.format {
        SourceFormat::Stl => parse_stl(&name, &read(&request.path)?)?,
        SourceFormat::Obj => {
            let bytes = read(&request.path)?;
            parse_obj(&name, &String::from_utf8_lossy(&bytes))?
        }
        SourceFormat::Fbx => {
            read(&request.path)?;
            warn!(path = %request.path.display(), "FBX geometry is not parsed; using placeholder bounds");
            LoadedAsset::from_parts(
                name,
                vec![PartNode::new(
                    "placeholder",
                    DEFAULT_MATERIAL,
                    BoundingVolume::from_center_size(DVec3::ZERO, DVec3::ONE),
                )],
            )
        }
        SourceFormat::Other(ext) => return Err(LoadError::UnsupportedFormat(ext.clone())),
    };

    debug!(
        path = %request.path.display(),
        parts = asset.node.parts.len(),
        size = ?asset.bounds.size(),
        "Model file scanned"
    );
    Ok(asset)
}

fn read(path: &Path) -> Result<Vec<u8>, LoadError> {
    std::fs::read(path).map_err(|e| LoadError::ParseFailed(format!("{}: {}", path.display(), e)))
}

/// Bounds of an STL file, binary or ASCII
pub fn parse_stl(name: &str, bytes: &[u8]) -> Result<LoadedAsset, LoadError> {
    let bounds = if is_binary_stl(bytes) {
        binary_stl_bounds(bytes)
    } else if bytes.trim_ascii_start().starts_with(b"solid") {
        ascii_stl_bounds(&String::from_utf8_lossy(bytes))?
    } else {
        return Err(LoadError::ParseFailed("not a binary or ASCII STL file".to_string()));
    };

    if bounds.is_empty() {
        return Err(LoadError::ParseFailed("STL file contains no triangles".to_string()));
    }
    Ok(LoadedAsset::from_parts(
        name,
        vec![PartNode::new(name, DEFAULT_MATERIAL, bounds)],
    ))
}

/// Binary STL is recognised by its size matching the triangle count, since
/// binary headers are allowed to start with "solid" too.
fn is_binary_stl(bytes: &[u8]) -> bool {
    if bytes.len() < STL_HEADER_LEN + 4 {
        return false;
    }
    let count = u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]) as usize;
    count
        .checked_mul(STL_TRIANGLE_LEN)
        .and_then(|n| n.checked_add(STL_HEADER_LEN + 4))
        == Some(bytes.len())
}

fn binary_stl_bounds(bytes: &[u8]) -> BoundingVolume {
    let mut bounds = BoundingVolume::EMPTY;
    for tri in bytes[STL_HEADER_LEN + 4..].chunks_exact(STL_TRIANGLE_LEN) {
        // Skip the 12-byte normal; three vertices follow
        for v in tri[12..48].chunks_exact(12) {
            let f = |i: usize| f32::from_le_bytes([v[i], v[i + 1], v[i + 2], v[i + 3]]) as f64;
            bounds.encapsulate_point(DVec3::new(f(0), f(4), f(8)));
        }
    }
    bounds
}

fn ascii_stl_bounds(text: &str) -> Result<BoundingVolume, LoadError> {
    let mut bounds = BoundingVolume::EMPTY;
    for (line_no, line) in text.lines().enumerate() {
        let mut fields = line.split_whitespace();
        if fields.next() == Some("vertex") {
            let point = parse_vec3(fields)
                .ok_or_else(|| LoadError::ParseFailed(format!("bad vertex on line {}", line_no + 1)))?;
            bounds.encapsulate_point(point);
        }
    }
    Ok(bounds)
}

fn parse_vec3<'a>(mut fields: impl Iterator<Item = &'a str>) -> Option<DVec3> {
    let mut next = || fields.next()?.parse::<f64>().ok();
    Some(DVec3::new(next()?, next()?, next()?))
}

struct ObjPart {
    name: String,
    material: String,
    bounds: BoundingVolume,
}

/// Per-object bounds of a Wavefront OBJ file.
///
/// Parts are split on `o`/`g` statements and on material changes; a part's
/// bounds cover the vertices its faces reference. A file without faces is
/// treated as a single point cloud.
pub fn parse_obj(name: &str, text: &str) -> Result<LoadedAsset, LoadError> {
    let mut vertices: Vec<DVec3> = Vec::new();
    let mut parts: Vec<ObjPart> = Vec::new();
    let mut current = ObjPart {
        name: name.to_string(),
        material: DEFAULT_MATERIAL.to_string(),
        bounds: BoundingVolume::EMPTY,
    };

    for (line_no, line) in text.lines().enumerate() {
        let line = line.split('#').next().unwrap_or("").trim();
        let mut fields = line.split_whitespace();
        let bad = |what: &str| LoadError::ParseFailed(format!("bad {} on line {}", what, line_no + 1));

        match fields.next() {
            Some("v") => vertices.push(parse_vec3(fields).ok_or_else(|| bad("vertex"))?),
            Some("o") | Some("g") => {
                let next_name = fields.collect::<Vec<_>>().join(" ");
                let material = current.material.clone();
                finish_part(&mut parts, &mut current, next_name, material);
            }
            Some("usemtl") => {
                let material = fields.next().unwrap_or(DEFAULT_MATERIAL).to_string();
                if current.bounds.is_empty() {
                    current.material = material;
                } else {
                    let part_name = current.name.clone();
                    finish_part(&mut parts, &mut current, part_name, material);
                }
            }
            Some("f") => {
                for field in fields {
                    let index = field
                        .split('/')
                        .next()
                        .and_then(|i| i.parse::<i64>().ok())
                        .ok_or_else(|| bad("face"))?;
                    let vertex = resolve_index(index, vertices.len()).ok_or_else(|| bad("face index"))?;
                    current.bounds.encapsulate_point(vertices[vertex]);
                }
            }
            _ => {}
        }
    }
    let material = current.material.clone();
    finish_part(&mut parts, &mut current, String::new(), material);

    if parts.is_empty() {
        let bounds = BoundingVolume::from_points(vertices.iter().copied());
        if bounds.is_empty() {
            return Err(LoadError::ParseFailed("OBJ file contains no geometry".to_string()));
        }
        parts.push(ObjPart {
            name: name.to_string(),
            material: DEFAULT_MATERIAL.to_string(),
            bounds,
        });
    }

    let nodes = parts
        .into_iter()
        .map(|p| PartNode::new(p.name, p.material, p.bounds))
        .collect();
    Ok(LoadedAsset::from_parts(name, nodes))
}

/// Close the current part (if it has geometry) and start a new one
fn finish_part(parts: &mut Vec<ObjPart>, current: &mut ObjPart, name: String, material: String) {
    let next = ObjPart {
        name: if name.is_empty() { current.name.clone() } else { name },
        material,
        bounds: BoundingVolume::EMPTY,
    };
    let done = std::mem::replace(current, next);
    if !done.bounds.is_empty() {
        parts.push(done);
    }
}

/// OBJ indices are 1-based; negative values count back from the last vertex
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let resolved = if index > 0 { index - 1 } else { len + index };
    (0..len).contains(&resolved).then_some(resolved as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary_stl(triangles: &[[[f32; 3]; 3]]) -> Vec<u8> {
        let mut buf = b"solid but actually binary".to_vec();
        buf.resize(STL_HEADER_LEN, 0);
        buf.extend_from_slice(&(triangles.len() as u32).to_le_bytes());
        for tri in triangles {
            buf.extend_from_slice(&[0u8; 12]);
            for v in tri {
                for c in v {
                    buf.extend_from_slice(&c.to_le_bytes());
                }
            }
            buf.extend_from_slice(&0u16.to_le_bytes());
        }
        buf
    }

    #[test]
    fn test_binary_stl_bounds() {
        let bytes = binary_stl(&[
            [[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 3.0, 0.0]],
            [[0.0, 0.0, 4.0], [2.0, 3.0, 4.0], [1.0, 1.0, 1.0]],
        ]);
        let asset = parse_stl("block", &bytes).unwrap();
        assert_eq!(asset.bounds.min, DVec3::ZERO);
        assert_eq!(asset.bounds.max, DVec3::new(2.0, 3.0, 4.0));
        assert_eq!(asset.node.parts.len(), 1);
    }

    #[test]
    fn test_ascii_stl_bounds() {
        let text = "solid cube\n facet normal 0 0 1\n  outer loop\n   vertex -1 0 0\n   vertex 1 2 0\n   vertex 0 0 5\n  endloop\n endfacet\nendsolid cube\n";
        let asset = parse_stl("cube", text.as_bytes()).unwrap();
        assert_eq!(asset.bounds.size(), DVec3::new(2.0, 2.0, 5.0));
    }

    #[test]
    fn test_stl_rejects_garbage() {
        assert_eq!(parse_stl("x", b"hello").unwrap_err().code(), "parse_failed");
        assert_eq!(
            parse_stl("x", b"solid empty\nendsolid empty\n").unwrap_err().code(),
            "parse_failed"
        );
    }

    #[test]
    fn test_obj_parts_and_materials() {
        let text = "\
# bracket
v 0 0 0
v 1 0 0
v 1 1 0
v 5 5 5
v 6 5 5
v 6 6 6
o base
usemtl steel
f 1 2 3
o pin
usemtl brass
f 4/1/1 5/1/1 -1
";
        let asset = parse_obj("bracket", text).unwrap();
        let parts = &asset.node.parts;
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name, "base");
        assert_eq!(parts[0].material, "steel");
        assert_eq!(parts[0].bounds.max, DVec3::new(1.0, 1.0, 0.0));
        assert_eq!(parts[1].material, "brass");
        assert_eq!(parts[1].bounds.min, DVec3::splat(5.0));
        assert_eq!(asset.bounds.max, DVec3::splat(6.0));
    }

    #[test]
    fn test_obj_point_cloud_and_errors() {
        let asset = parse_obj("cloud", "v 0 0 0\nv 2 2 2\n").unwrap();
        assert_eq!(asset.node.parts.len(), 1);
        assert_eq!(asset.bounds.size(), DVec3::splat(2.0));

        assert!(parse_obj("bad", "v 0 0 0\nf 1 2 3\n").is_err());
        assert!(parse_obj("empty", "# nothing\n").is_err());
    }

    #[test]
    fn test_unsupported_format() {
        let request = LoadRequest::from_path("part.step");
        assert_eq!(
            load_file(&request).unwrap_err(),
            LoadError::UnsupportedFormat("step".to_string())
        );
    }

    #[tokio::test]
    async fn test_loader_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let stl = dir.path().join("plate.stl");
        std::fs::write(&stl, binary_stl(&[[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]])).unwrap();
        let fbx = dir.path().join("robot.fbx");
        std::fs::write(&fbx, b"Kaydara FBX Binary").unwrap();

        let loader = MeshFileLoader::new();
        let asset = loader.load(LoadRequest::from_path(&stl)).await.unwrap();
        assert_eq!(asset.node.name, "plate");
        let asset = loader.load(LoadRequest::from_path(&fbx)).await.unwrap();
        assert_eq!(asset.bounds.size(), DVec3::ONE);

        let missing = loader.load(LoadRequest::from_path(dir.path().join("gone.obj"))).await;
        assert_eq!(missing.unwrap_err().code(), "parse_failed");
    }
}
