//! Where class bytes come from, and the cache of parsed descriptions.

use crate::error::{ProxyError, Result};
use crate::model::{ClassDescriptor, OBJECT};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use zip::ZipArchive;
use zip::result::ZipError;

/// Supplies raw class-file bytes by internal name (`com/example/Foo`).
pub trait ClassSource: Send + Sync {
    fn class_bytes(&self, name: &str) -> Result<Option<Vec<u8>>>;
}

/// Classes laid out as `<root>/com/example/Foo.class`.
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ClassSource for DirectorySource {
    fn class_bytes(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.root.join(format!("{name}.class"));
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

pub struct JarSource {
    path: PathBuf,
    archive: Mutex<ZipArchive<File>>,
}

impl JarSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let archive = ZipArchive::new(file)?;
        Ok(Self {
            path,
            archive: Mutex::new(archive),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Internal names of every class in the archive.
    pub fn class_names(&self) -> Vec<String> {
        let archive = self.archive.lock();
        let mut names: Vec<String> = archive
            .file_names()
            .filter_map(|n| n.strip_suffix(".class"))
            .filter(|n| !n.ends_with("module-info") && !n.ends_with("package-info"))
            .map(str::to_string)
            .collect();
        names.sort();
        names
    }
}

impl ClassSource for JarSource {
    fn class_bytes(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let mut archive = self.archive.lock();
        let mut entry = match archive.by_name(&format!("{name}.class")) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        Ok(Some(bytes))
    }
}

/// Class bytes held in memory, for fixtures and weaving hooks.
#[derive(Default)]
pub struct MemorySource {
    classes: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, bytes: Vec<u8>) {
        self.classes.lock().insert(name.into(), bytes);
    }

    pub fn with(self, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(name, bytes);
        self
    }
}

impl ClassSource for MemorySource {
    fn class_bytes(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.classes.lock().get(name).cloned())
    }
}

/// Ordered list of sources. The first one that knows a class wins.
#[derive(Default)]
pub struct ClassPath {
    sources: Vec<Box<dyn ClassSource>>,
}

impl ClassPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, source: impl ClassSource + 'static) {
        self.sources.push(Box::new(source));
    }

    /// Build from directories and `.jar`/`.zip` files.
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut class_path = Self::new();
        for path in paths {
            let path = path.as_ref();
            if path.is_dir() {
                class_path.push(DirectorySource::new(path));
            } else {
                class_path.push(JarSource::open(path)?);
            }
        }
        Ok(class_path)
    }
}

impl ClassSource for ClassPath {
    fn class_bytes(&self, name: &str) -> Result<Option<Vec<u8>>> {
        for source in &self.sources {
            if let Some(bytes) = source.class_bytes(name)? {
                return Ok(Some(bytes));
            }
        }
        Ok(None)
    }
}

/// Parsed class descriptions, loaded on demand and cached by name.
pub struct ClassRepository {
    source: Box<dyn ClassSource>,
    cache: DashMap<String, Arc<ClassDescriptor>>,
}

impl ClassRepository {
    pub fn new(source: impl ClassSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            cache: DashMap::new(),
        }
    }

    /// Load `name`, or `Ok(None)` when no source has it. `java/lang/Object`
    /// is always available.
    pub fn find(&self, name: &str) -> Result<Option<Arc<ClassDescriptor>>> {
        if let Some(cached) = self.cache.get(name) {
            return Ok(Some(cached.value().clone()));
        }
        let descriptor = match self.source.class_bytes(name)? {
            Some(bytes) => ClassDescriptor::parse(&bytes)?,
            None if name == OBJECT => ClassDescriptor::object(),
            None => return Ok(None),
        };
        debug!("Loaded class description for {}", name);
        let descriptor = Arc::new(descriptor);
        self.cache.insert(name.to_string(), descriptor.clone());
        Ok(Some(descriptor))
    }

    pub fn load(&self, name: &str) -> Result<Arc<ClassDescriptor>> {
        self.find(name)?
            .ok_or_else(|| ProxyError::ClassNotFound(name.replace('/', ".")))
    }

    /// Register a description that did not come from the source, e.g. the
    /// class a weaving hook is currently defining.
    pub fn insert(&self, descriptor: ClassDescriptor) -> Arc<ClassDescriptor> {
        let descriptor = Arc::new(descriptor);
        self.cache
            .insert(descriptor.name.clone(), descriptor.clone());
        descriptor
    }

    /// `class` followed by each superclass up to and including
    /// `java/lang/Object`.
    pub fn superclasses(&self, class: &Arc<ClassDescriptor>) -> Result<Vec<Arc<ClassDescriptor>>> {
        let mut chain = vec![class.clone()];
        let mut current = class.clone();
        while let Some(super_name) = current.super_name.clone() {
            if chain.len() > 256 {
                return Err(ProxyError::format(format!(
                    "superclass chain of {} does not terminate",
                    class.name
                )));
            }
            current = self.load(&super_name)?;
            chain.push(current.clone());
        }
        Ok(chain)
    }

    /// Whether `class` is `Serializable` through itself, a superclass or any
    /// super-interface. Interfaces that cannot be loaded are skipped.
    pub fn is_serializable(&self, class: &Arc<ClassDescriptor>) -> Result<bool> {
        let mut pending: Vec<String> = Vec::new();
        for c in self.superclasses(class)? {
            pending.extend(c.interfaces.iter().cloned());
        }
        let mut seen = std::collections::HashSet::new();
        while let Some(name) = pending.pop() {
            if name == "java/io/Serializable" || name == "java/io/Externalizable" {
                return Ok(true);
            }
            if !seen.insert(name.clone()) {
                continue;
            }
            if let Some(iface) = self.find(&name)? {
                pending.extend(iface.interfaces.iter().cloned());
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn minimal_class(name: &str) -> Vec<u8> {
        crate::classfile::ClassWriter::new(52, crate::classfile::access::PUBLIC, name, Some(OBJECT))
            .unwrap()
            .to_bytes()
            .unwrap()
    }

    #[test]
    fn test_jar_and_directory_sources() {
        let dir = tempdir().unwrap();
        let jar_path = dir.path().join("lib.jar");
        let file = File::create(&jar_path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("com/example/InJar.class", options).unwrap();
        zip.write_all(&minimal_class("com/example/InJar")).unwrap();
        zip.finish().unwrap();

        let classes = dir.path().join("classes/com/example");
        std::fs::create_dir_all(&classes).unwrap();
        std::fs::write(classes.join("InDir.class"), minimal_class("com/example/InDir")).unwrap();

        let class_path =
            ClassPath::from_paths(&[dir.path().join("classes"), jar_path.clone()]).unwrap();
        let repo = ClassRepository::new(class_path);

        assert_eq!(repo.load("com/example/InJar").unwrap().name, "com/example/InJar");
        assert_eq!(repo.load("com/example/InDir").unwrap().name, "com/example/InDir");
        assert!(matches!(
            repo.load("com/example/Missing"),
            Err(ProxyError::ClassNotFound(n)) if n == "com.example.Missing"
        ));

        let jar = JarSource::open(&jar_path).unwrap();
        assert_eq!(jar.class_names(), vec!["com/example/InJar".to_string()]);
    }

    #[test]
    fn test_object_fallback_and_chain() {
        let repo = ClassRepository::new(
            MemorySource::new().with("com/example/A", minimal_class("com/example/A")),
        );
        let a = repo.load("com/example/A").unwrap();
        let chain = repo.superclasses(&a).unwrap();
        let names: Vec<_> = chain.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["com/example/A", OBJECT]);
        assert!(!repo.is_serializable(&a).unwrap());
    }
}
