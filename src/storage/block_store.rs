// One file per block under a per-ledger directory.
// File names are zero-padded so a plain sort of the directory listing is id order.

use crate::core::Block;
use crate::error::Result;
use log::debug;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const BLOCK_FILE_PREFIX: &str = "block_";
const BLOCK_FILE_EXTENSION: &str = ".bin";
const LEDGER_DIR_PREFIX: &str = "ledger__";

#[derive(Debug, Clone)]
pub struct BlockStore {
    dir: PathBuf,
}

impl BlockStore {
    pub fn new(dir: impl Into<PathBuf>) -> BlockStore {
        BlockStore { dir: dir.into() }
    }

    /// Store for a named ledger inside `data_dir` (`<data_dir>/ledger__<name>`)
    pub fn for_ledger(data_dir: &Path, ledger_name: &str) -> BlockStore {
        let dir_name = format!("{LEDGER_DIR_PREFIX}{}", sanitize(ledger_name));
        BlockStore::new(data_dir.join(dir_name))
    }

    pub fn dir(&self) -> &Path {
        self.dir.as_path()
    }

    pub fn block_path(&self, block_id: u64) -> PathBuf {
        self.dir
            .join(format!("{BLOCK_FILE_PREFIX}{block_id:020}{BLOCK_FILE_EXTENSION}"))
    }

    pub fn save(&self, block: &Block) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.block_path(block.get_id());
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(block.serialize()?.as_slice())?;
        writer.flush()?;
        debug!("Saved block {} to {}", block.get_id(), path.display());
        Ok(())
    }

    pub fn load(&self, block_id: u64) -> Result<Option<Block>> {
        let path = self.block_path(block_id);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(read_block(&path)?))
    }

    pub fn load_all(&self) -> Result<Vec<Block>> {
        if !self.dir.exists() {
            return Ok(vec![]);
        }

        let mut names = vec![];
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name().to_string_lossy().to_string();
            if name.starts_with(BLOCK_FILE_PREFIX) && name.ends_with(BLOCK_FILE_EXTENSION) {
                names.push(name);
            }
        }
        names.sort();

        names
            .iter()
            .map(|name| read_block(&self.dir.join(name)))
            .collect()
    }
}

fn read_block(path: &Path) -> Result<Block> {
    let mut file = File::open(path)?;
    let mut buf = vec![];
    file.read_to_end(&mut buf)?;
    Block::deserialize(&buf)
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Payload;
    use serde_json::json;
    use tempfile::tempdir;

    fn block(id: u64) -> Block {
        let payload = Payload::new(&json!({ "id": id })).unwrap();
        Block::new_block(id, "row", vec![payload], id * 10, format!("prev{id}"), "pk").unwrap()
    }

    #[test]
    fn test_save_then_load_returns_equal_block() {
        let temp_dir = tempdir().unwrap();
        let store = BlockStore::new(temp_dir.path().join("ledger"));

        let original = block(4);
        store.save(&original).unwrap();

        assert_eq!(store.load(4).unwrap(), Some(original));
    }

    #[test]
    fn test_load_missing_block_is_none() {
        let temp_dir = tempdir().unwrap();
        let store = BlockStore::new(temp_dir.path());
        assert_eq!(store.load(99).unwrap(), None);
    }

    #[test]
    fn test_load_all_returns_id_order_past_nine() {
        let temp_dir = tempdir().unwrap();
        let store = BlockStore::new(temp_dir.path().join("ledger"));

        for id in (1..=12).rev() {
            store.save(&block(id)).unwrap();
        }

        let ids: Vec<u64> = store.load_all().unwrap().iter().map(Block::get_id).collect();
        assert_eq!(ids, (1..=12).collect::<Vec<_>>());
    }

    #[test]
    fn test_load_all_on_missing_dir_is_empty() {
        let temp_dir = tempdir().unwrap();
        let store = BlockStore::new(temp_dir.path().join("never-created"));
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_save_overwrites_same_id() {
        let temp_dir = tempdir().unwrap();
        let store = BlockStore::new(temp_dir.path());
        store.save(&block(2)).unwrap();
        let replacement = Block::new_block(2, "other", vec![], 1, "x".into(), "").unwrap();
        store.save(&replacement).unwrap();

        assert_eq!(store.load_all().unwrap(), vec![replacement]);
    }

    #[test]
    fn test_corrupt_block_file_is_an_error() {
        let temp_dir = tempdir().unwrap();
        let store = BlockStore::new(temp_dir.path());
        store.save(&block(1)).unwrap();
        fs::write(store.block_path(1), [0xFF, 0xFF]).unwrap();

        assert!(store.load_all().is_err());
    }

    #[test]
    fn test_ledger_dir_name_is_sanitized() {
        let store = BlockStore::for_ledger(Path::new("/data"), "my table/../x");
        assert_eq!(store.dir(), Path::new("/data/ledger__my_table____x"));
    }
}
