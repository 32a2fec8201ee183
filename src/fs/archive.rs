use super::{clean_path, path_components, Filesystem, WalkEntry};
use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::collections::BTreeMap;
use std::io::{self, Cursor, Read};
use std::path::Path;
use tar::{Archive, EntryType};
use tracing::debug;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const USTAR_MAGIC_OFFSET: usize = 257;
const TAR_BLOCK: usize = 512;

enum Node {
    Dir,
    File(Vec<u8>),
}

/// An in-memory view of a tar archive, optionally gzip-compressed.
///
/// Entries are keyed by their path components, so iterating the map in order
/// is a depth-first walk with every directory's entries in lexical order.
pub struct ArchiveFs {
    nodes: BTreeMap<Vec<String>, Node>,
}

impl ArchiveFs {
    /// Reads an archive file from disk.
    pub fn open_path(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        Self::from_bytes(data, &path.display().to_string())
    }

    /// Reads a whole archive from a stream.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader
            .read_to_end(&mut data)
            .map_err(|e| Error::io("<archive>", e))?;
        Self::from_bytes(data, "<archive>")
    }

    fn from_bytes(data: Vec<u8>, label: &str) -> Result<Self> {
        let data = if data.starts_with(&GZIP_MAGIC) {
            debug!(archive = label, "decompressing gzip archive");
            let mut decompressed = Vec::new();
            GzDecoder::new(data.as_slice())
                .read_to_end(&mut decompressed)
                .map_err(|e| Error::io(label, e))?;
            decompressed
        } else {
            data
        };

        if !looks_like_tar(&data) {
            return Err(Error::UnsupportedArchive(format!(
                "{}: neither a tar nor a gzip-compressed tar archive",
                label
            )));
        }

        let mut nodes = BTreeMap::new();
        nodes.insert(Vec::new(), Node::Dir);

        let mut archive = Archive::new(Cursor::new(data));
        for entry in archive.entries().map_err(|e| Error::io(label, e))? {
            let mut entry = entry.map_err(|e| Error::io(label, e))?;
            let path = entry.path().map_err(|e| Error::io(label, e))?;
            let parts = path_components(&path.to_string_lossy());
            if parts.is_empty() {
                continue;
            }

            let node = match entry.header().entry_type() {
                EntryType::Directory => Node::Dir,
                EntryType::Regular | EntryType::Continuous => {
                    let mut content = Vec::new();
                    entry
                        .read_to_end(&mut content)
                        .map_err(|e| Error::io(label, e))?;
                    Node::File(content)
                }
                other => {
                    debug!(path = %parts.join("/"), kind = ?other, "skipping archive entry");
                    continue;
                }
            };

            for depth in 1..parts.len() {
                nodes.entry(parts[..depth].to_vec()).or_insert(Node::Dir);
            }
            nodes.insert(parts, node);
        }

        debug!(archive = label, entries = nodes.len(), "loaded archive");
        Ok(Self { nodes })
    }
}

fn looks_like_tar(data: &[u8]) -> bool {
    if data.len() < TAR_BLOCK {
        // An empty archive is a couple of zero blocks, or nothing at all.
        return data.iter().all(|b| *b == 0);
    }
    if &data[USTAR_MAGIC_OFFSET..USTAR_MAGIC_OFFSET + 5] == b"ustar" {
        return true;
    }
    // Pre-POSIX archives carry no magic; accept them if the header checksum adds up.
    tar::Header::from_byte_slice(&data[..TAR_BLOCK])
        .cksum()
        .map(|expected| {
            let actual: u32 = data[..TAR_BLOCK]
                .iter()
                .enumerate()
                .map(|(i, b)| if (148..156).contains(&i) { 32 } else { *b as u32 })
                .sum();
            expected == actual
        })
        .unwrap_or(false)
}

impl Filesystem for ArchiveFs {
    fn open(&self, path: &str) -> Result<Box<dyn Read + '_>> {
        match self.nodes.get(&path_components(path)) {
            Some(Node::File(content)) => Ok(Box::new(content.as_slice())),
            Some(Node::Dir) => Err(Error::io(
                clean_path(path),
                io::Error::new(io::ErrorKind::Other, "is a directory"),
            )),
            None => Err(Error::io(
                clean_path(path),
                io::Error::from(io::ErrorKind::NotFound),
            )),
        }
    }

    fn exists(&self, path: &str) -> bool {
        self.nodes.contains_key(&path_components(path))
    }

    fn walk<'a>(&'a self, root: &str) -> Box<dyn Iterator<Item = Result<WalkEntry>> + 'a> {
        let root = path_components(root);
        if !self.nodes.contains_key(&root) {
            let err = Error::io(
                clean_path(&root.join("/")),
                io::Error::from(io::ErrorKind::NotFound),
            );
            return Box::new(std::iter::once(Err(err)));
        }

        Box::new(
            self.nodes
                .range(root.clone()..)
                .take_while(move |(parts, _)| parts.starts_with(&root))
                .map(|(parts, node)| {
                    Ok(WalkEntry {
                        path: clean_path(&parts.join("/")),
                        is_dir: matches!(node, Node::Dir),
                        is_file: matches!(node, Node::File(_)),
                    })
                }),
        )
    }
}
