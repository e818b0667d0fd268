//! `bond build`: bundle a script and every script it imports into an archive
//!
//! The entry script is module 0. Each imported `.bd` file is compiled once,
//! gets the next module id, and the importing code loads it with
//! `IMPORT_PRE_COMPILED`. Native libraries, packages and `core:` modules are
//! left to the import runtime.

use crate::error::{CliError, CliResult};
use bytecode_system::{Archive, Code};
use core_types::Span;
use interpreter::{resolve_import, ModuleKind};
use parser::{Compiler, ImportResolver};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Compiles a module graph into an [`Archive`].
#[derive(Debug)]
pub struct ArchiveBuilder {
    lib_path: PathBuf,
    archive: Archive,
    ids: HashMap<PathBuf, u32>,
    next_id: u32,
}

impl ArchiveBuilder {
    pub fn new(lib_path: impl Into<PathBuf>) -> Self {
        ArchiveBuilder {
            lib_path: lib_path.into(),
            archive: Archive::new(),
            ids: HashMap::new(),
            next_id: 0,
        }
    }

    /// Compile `entry` and its script imports.
    pub fn build(mut self, entry: &Path) -> CliResult<Archive> {
        let entry = entry.canonicalize().map_err(|e| CliError::io(entry, e))?;
        self.add_script(&entry)?;
        info!(entry = %entry.display(), modules = self.archive.len(), "built archive");
        Ok(self.archive)
    }

    /// Compile `entry` and write the archive to `output`.
    pub fn build_to(self, entry: &Path, output: &Path) -> CliResult<PathBuf> {
        let archive = self.build(entry)?;
        archive.save(output)?;
        Ok(output.to_path_buf())
    }

    /// Module id of the script at canonical `path`, compiling it on first use.
    fn add_script(&mut self, path: &Path) -> CliResult<u32> {
        if let Some(id) = self.ids.get(path) {
            return Ok(*id);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.ids.insert(path.to_path_buf(), id);
        // Reserve the slot so modules keep discovery order.
        self.archive.add_module(id, Code::new());

        let source = fs::read_to_string(path).map_err(|e| CliError::io(path, e))?;
        let dir = path.parent().map(Path::to_path_buf);
        let mut resolver = Resolver {
            builder: self,
            dir,
            error: None,
        };
        let compiled = Compiler::new().compile_with_resolver(&source, id, &mut resolver);
        if let Some(error) = resolver.error {
            return Err(error);
        }
        let code = compiled.map_err(|diagnostics| CliError::Compile {
            path: Some(path.to_path_buf()),
            diagnostics,
        })?;
        debug!(id, path = %path.display(), "compiled archive module");
        self.archive.add_module(id, code);
        Ok(id)
    }
}

struct Resolver<'a> {
    builder: &'a mut ArchiveBuilder,
    dir: Option<PathBuf>,
    /// First failure while compiling an imported script
    error: Option<CliError>,
}

impl ImportResolver for Resolver<'_> {
    fn resolve_import(&mut self, path: &str, _span: Span) -> Option<u32> {
        if self.error.is_some() || path.starts_with("core:") {
            return None;
        }
        let resolved = resolve_import(&self.builder.lib_path, self.dir.as_deref(), path)?;
        if resolved.kind != ModuleKind::Script {
            return None;
        }
        match self.builder.add_script(&resolved.path) {
            Ok(id) => Some(id),
            Err(e) => {
                self.error = Some(e);
                None
            }
        }
    }
}
