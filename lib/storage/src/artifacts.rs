//! On-disk home of trained models.
//!
//! Layout of a data directory:
//!
//! ```text
//! <dir>/similarity.bin.gz   bincode SimilarityMatrix, gzip
//! <dir>/itemsets.bin.gz     bincode Vec<ItemSet>, gzip
//! <dir>/rules.bin.gz        bincode Vec<AssociationRule>, gzip
//! <dir>/manifest.json       metadata + sha256 of each file above
//! ```
//!
//! The manifest is written last, so a directory with a manifest always has
//! a complete artifact set behind it.

use crate::error::{Result, StorageError};
use basketx_core::{
    AssociationRule, ItemSet, ModelSnapshot, RuleSet, SimilarityMatrix, TrainedModels,
    TrainingMetadata,
};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

pub const SIMILARITY_FILE: &str = "similarity.bin.gz";
pub const ITEMSETS_FILE: &str = "itemsets.bin.gz";
pub const RULES_FILE: &str = "rules.bin.gz";
pub const MANIFEST_FILE: &str = "manifest.json";

const ARTIFACT_FILES: [&str; 3] = [SIMILARITY_FILE, ITEMSETS_FILE, RULES_FILE];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub metadata: TrainingMetadata,
    /// File name to hex sha256 of its bytes on disk
    pub checksums: BTreeMap<String, String>,
}

pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether a manifest and every artifact it covers are present
    pub fn exists(&self) -> bool {
        self.dir.join(MANIFEST_FILE).is_file()
            && ARTIFACT_FILES.iter().all(|f| self.dir.join(f).is_file())
    }

    /// Persist a training run, replacing whatever was stored before
    pub fn save(&self, models: &TrainedModels) -> Result<Manifest> {
        let mut checksums = BTreeMap::new();
        checksums.insert(
            SIMILARITY_FILE.to_string(),
            self.write_artifact(SIMILARITY_FILE, &models.similarity)?,
        );
        checksums.insert(
            ITEMSETS_FILE.to_string(),
            self.write_artifact(ITEMSETS_FILE, &models.rules.itemsets())?,
        );
        checksums.insert(
            RULES_FILE.to_string(),
            self.write_artifact(RULES_FILE, &models.rules.rules())?,
        );

        let manifest = Manifest {
            version: FORMAT_VERSION,
            created_at: Utc::now(),
            metadata: models.metadata.clone(),
            checksums,
        };
        write_atomic(
            &self.dir.join(MANIFEST_FILE),
            &serde_json::to_vec_pretty(&manifest)?,
        )?;

        tracing::info!(
            dir = %self.dir.display(),
            products = models.similarity.dim(),
            rules = models.rules.len(),
            "saved model artifacts"
        );
        Ok(manifest)
    }

    pub fn manifest(&self) -> Result<Manifest> {
        let path = self.dir.join(MANIFEST_FILE);
        let bytes = read_file(&path)?;
        let manifest: Manifest = serde_json::from_slice(&bytes)?;
        if manifest.version != FORMAT_VERSION {
            return Err(StorageError::UnsupportedVersion(manifest.version));
        }
        Ok(manifest)
    }

    /// Load and verify the stored models
    pub fn load(&self) -> Result<ModelSnapshot> {
        let manifest = self.manifest()?;

        let similarity: SimilarityMatrix = self.read_artifact(SIMILARITY_FILE, &manifest)?;
        let itemsets: Vec<ItemSet> = self.read_artifact(ITEMSETS_FILE, &manifest)?;
        let rules: Vec<AssociationRule> = self.read_artifact(RULES_FILE, &manifest)?;

        let meta = &manifest.metadata;
        if itemsets.len() != meta.itemset_count || rules.len() != meta.rule_count {
            return Err(StorageError::Corrupt(format!(
                "manifest lists {} itemsets and {} rules, artifacts hold {} and {}",
                meta.itemset_count,
                meta.rule_count,
                itemsets.len(),
                rules.len()
            )));
        }
        if similarity.dim() != meta.item_count {
            return Err(StorageError::Corrupt(format!(
                "manifest lists {} products, similarity matrix has {}",
                meta.item_count,
                similarity.dim()
            )));
        }

        tracing::info!(
            dir = %self.dir.display(),
            products = similarity.dim(),
            rules = rules.len(),
            trained_at = %meta.trained_at,
            "loaded model artifacts"
        );
        Ok(ModelSnapshot::new(similarity, RuleSet::new(itemsets, rules))
            .with_metadata(manifest.metadata))
    }

    fn write_artifact<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<String> {
        let encoded = bincode::serialize(value)?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&encoded)?;
        let compressed = encoder.finish()?;

        write_atomic(&self.dir.join(name), &compressed)?;
        Ok(format!("{:x}", Sha256::digest(&compressed)))
    }

    fn read_artifact<T: DeserializeOwned>(&self, name: &str, manifest: &Manifest) -> Result<T> {
        let compressed = read_file(&self.dir.join(name))?;

        let expected = manifest
            .checksums
            .get(name)
            .ok_or_else(|| StorageError::Corrupt(format!("manifest has no checksum for {}", name)))?;
        let actual = format!("{:x}", Sha256::digest(&compressed));
        if &actual != expected {
            return Err(StorageError::ChecksumMismatch {
                file: name.to_string(),
                expected: expected.clone(),
                actual,
            });
        }

        let mut encoded = Vec::new();
        GzDecoder::new(compressed.as_slice()).read_to_end(&mut encoded)?;
        Ok(bincode::deserialize(&encoded)?)
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => StorageError::NotFound(path.to_path_buf()),
        _ => StorageError::Io(e),
    })
}

fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|f| f.write_all(data))
        .map_err(|e| match e {
            atomicwrites::Error::Internal(e) | atomicwrites::Error::User(e) => e,
        })
}
