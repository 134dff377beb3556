//! On-disk formats: the bincode language-model file and the framed spell
//! cache holding the two deletion filters.
//!
//! Both writers go through a temp file in the target directory and persist
//! atomically, so a crash mid-write never leaves a torn file behind.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::info;

use crate::core::model::NGramModel;
use crate::error::{Result, SpellError};
use crate::fuzzy::bloom::{read_u16, read_u64, BloomFilter};

const CACHE_MAGIC: u64 = 0x34E3_B8C2_FD8F_6F76;
const CACHE_VERSION: u16 = 1;

/// The spell cache lives next to its model: `<model>.spell`.
pub fn cache_path_for(model_path: &Path) -> PathBuf {
    let mut name = model_path.as_os_str().to_os_string();
    name.push(".spell");
    PathBuf::from(name)
}

pub fn save_model(model: &NGramModel, path: &Path) -> Result<()> {
    info!(path = %path.display(), "saving language model");
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let temp_file = NamedTempFile::new_in(parent)?;
    let writer = BufWriter::new(temp_file.as_file());
    bincode::serialize_into(writer, model)?;
    temp_file.persist(path).map_err(|e| SpellError::Io(e.error))?;
    Ok(())
}

pub fn load_model(path: &Path) -> Result<NGramModel> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let model: NGramModel = bincode::deserialize_from(reader)?;
    Ok(model)
}

/// Writes the cache stream: magic, version, model checksum, the two
/// filter dumps, and the magic again as a trailer. Refuses to save an
/// unbuilt cache.
pub fn save_cache(
    path: &Path,
    checksum: u64,
    deletes1: &BloomFilter,
    deletes2: &BloomFilter,
) -> Result<()> {
    info!(path = %path.display(), "saving spell cache");
    if deletes1.is_empty() || deletes2.is_empty() {
        return Err(SpellError::CacheEmpty);
    }

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let temp_file = NamedTempFile::new_in(parent)?;
    {
        let mut writer = BufWriter::new(temp_file.as_file());
        writer.write_all(&CACHE_MAGIC.to_le_bytes())?;
        writer.write_all(&CACHE_VERSION.to_le_bytes())?;
        writer.write_all(&checksum.to_le_bytes())?;
        deletes1.dump(&mut writer)?;
        deletes2.dump(&mut writer)?;
        writer.write_all(&CACHE_MAGIC.to_le_bytes())?;
        writer.flush()?;
    }
    temp_file.persist(path).map_err(|e| SpellError::Io(e.error))?;
    Ok(())
}

/// Reads a cache stream back, rejecting anything that does not match the
/// expected framing or the current model's checksum. Rejection is the
/// caller's cue to rebuild; nothing here panics.
pub fn load_cache(path: &Path, expected_checksum: u64) -> Result<(BloomFilter, BloomFilter)> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    if read_u64(&mut reader)? != CACHE_MAGIC {
        return Err(SpellError::CacheFormat("bad magic"));
    }
    if read_u16(&mut reader)? != CACHE_VERSION {
        return Err(SpellError::CacheFormat("unsupported version"));
    }
    if read_u64(&mut reader)? != expected_checksum {
        return Err(SpellError::CacheFormat("model checksum mismatch"));
    }

    let deletes1 = BloomFilter::load(&mut reader)?;
    let deletes2 = BloomFilter::load(&mut reader)?;

    if read_u64(&mut reader)? != CACHE_MAGIC {
        return Err(SpellError::CacheFormat("bad trailer"));
    }
    Ok((deletes1, deletes2))
}
